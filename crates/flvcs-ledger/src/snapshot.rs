use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use flvcs_types::{Digest, Timestamp};

use crate::error::SnapshotError;
use crate::ledger::LedgerState;

/// Current snapshot format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Point-in-time copy of every ledger table, written as JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub format_version: u32,
    pub taken_at: Timestamp,
    /// Sequence number of the last event applied to `state`.
    pub last_event_seq: u64,
    /// Hash of that event; events after a restore chain onto it.
    pub last_event_hash: Option<Digest>,
    pub state: LedgerState,
}

impl LedgerSnapshot {
    pub fn new(
        state: LedgerState,
        taken_at: Timestamp,
        last_event_seq: u64,
        last_event_hash: Option<Digest>,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            taken_at,
            last_event_seq,
            last_event_hash,
            state,
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Write to `path`, replacing it atomically via a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;

        info!(
            path = %path.display(),
            commits = self.state.commits.len(),
            branches = self.state.branches.len(),
            seq = self.last_event_seq,
            "snapshot saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
