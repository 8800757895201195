use std::path::PathBuf;

use thiserror::Error;

use flvcs_events::JournalError;
use flvcs_types::LedgerError;

/// Errors loading a [`LedgerConfig`](crate::LedgerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors resolving deployed components.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("no address registered for component '{0}'")]
    Missing(String),

    #[error("component '{0}' cannot be registered at the null address")]
    NullAddress(String),
}

/// Errors writing or reading ledger snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("snapshot was taken at event {snapshot_seq} but the journal ends at event {journal_seq}")]
    JournalMismatch { snapshot_seq: u64, journal_seq: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors opening a ledger.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("event journal: {0}")]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
