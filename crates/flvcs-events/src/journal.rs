use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flvcs_crypto::HashChainVerifier;

use crate::error::{JournalError, JournalResult};
use crate::event::LedgerEvent;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush strategy for journal appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Flush to the OS and rely on its page cache.
    #[default]
    OsDefault,
}

/// Configuration for the [`EventJournal`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JournalConfig {
    pub sync_mode: SyncMode,
}

struct JournalWriter {
    writer: BufWriter<File>,
    offset: u64,
}

/// Append-only on-disk record of every ledger event.
///
/// On-disk format, one frame per event:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LedgerEvent)]
/// ```
///
/// CRC framing catches torn writes; the events' own hash chain catches
/// deliberate edits. [`EventJournal::verify`] checks both.
pub struct EventJournal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
    config: JournalConfig,
}

impl EventJournal {
    /// Open (or create) the journal file at `path`.
    ///
    /// A torn frame at the end of the file, left by a crash mid-append, is
    /// cut off so that new frames follow the last intact one.
    pub fn open(path: &Path, config: JournalConfig) -> JournalResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let (_, intact_len) = scan(&data);
        if intact_len < data.len() {
            warn!(
                path = %path.display(),
                kept = intact_len,
                dropped = data.len() - intact_len,
                "truncating torn journal tail"
            );
            file.set_len(intact_len as u64)?;
            file.sync_all()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(JournalWriter {
                writer: BufWriter::new(file),
                offset: intact_len as u64,
            }),
            config,
        })
    }

    /// Append one event. Returns the byte offset of its frame.
    pub fn append(&self, event: &LedgerEvent) -> JournalResult<u64> {
        let payload =
            bincode::serialize(event).map_err(|e| JournalError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut w = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("journal writer lock poisoned"))?;
        let frame_offset = w.offset;

        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }

        w.offset += (HEADER_SIZE + payload.len()) as u64;

        debug!(offset = frame_offset, seq = event.seq, "journal append");
        Ok(frame_offset)
    }

    /// Read back every intact event, front to back.
    ///
    /// A truncated trailing frame ends recovery; frames with a bad CRC or an
    /// undecodable payload are skipped with a warning.
    pub fn recover(&self) -> JournalResult<Vec<LedgerEvent>> {
        let mut data = Vec::new();
        BufReader::new(File::open(&self.path)?).read_to_end(&mut data)?;

        let (events, _) = scan(&data);
        debug!(recovered = events.len(), "journal recovery complete");
        Ok(events)
    }

    /// Recover all events and check that they form one unbroken chain.
    pub fn verify(&self) -> JournalResult<Vec<LedgerEvent>> {
        let events = self.recover()?;
        HashChainVerifier::verify_chain(&events)?;
        Ok(events)
    }

    /// Current end-of-file offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().map(|w| w.offset).unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Decode frames from the front of `data`.
///
/// Returns the decodable events and the length of the prefix made of whole
/// frames. Anything past that length is a torn tail.
fn scan(data: &[u8]) -> (Vec<LedgerEvent>, usize) {
    let mut events = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            warn!(offset, length, "truncated journal frame; stopping recovery");
            return (events, offset);
        }

        let payload = &data[start..start + length];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "journal CRC mismatch; skipping frame"
            );
        } else {
            match bincode::deserialize::<LedgerEvent>(payload) {
                Ok(event) => events.push(event),
                Err(e) => warn!(offset, error = %e, "undecodable journal frame; skipping"),
            }
        }

        offset = start + length;
    }

    (events, offset)
}

impl std::fmt::Debug for EventJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventJournal")
            .field("path", &self.path)
            .field("sync_mode", &self.config.sync_mode)
            .finish()
    }
}
