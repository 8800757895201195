use std::io;

/// Errors produced by the event journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// I/O error while reading or writing the journal file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Event encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The recovered events do not form an unbroken hash chain.
    #[error("journal chain broken: {0}")]
    Chain(#[from] flvcs_crypto::ChainError),
}

/// Convenience alias used throughout the events crate.
pub type JournalResult<T> = std::result::Result<T, JournalError>;
