use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use flvcs_events::{JournalConfig, NotifierConfig, SyncMode};
use flvcs_refs::BranchConfig;
use flvcs_store::StoreConfig;
use flvcs_types::Address;

use crate::error::ConfigError;

/// Startup configuration for a [`Ledger`](crate::Ledger).
///
/// ```toml
/// strict_parents = false
/// enforce_ancestry = false
/// event_channel_capacity = 1024
/// journal_path = "var/ledger.journal"
/// journal_sync = "every-write"
///
/// [components]
/// CommitLedger = "0x1111111111111111111111111111111111111111"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject commits whose non-null parents are not stored.
    pub strict_parents: bool,
    /// Require head moves to follow commit ancestry.
    pub enforce_ancestry: bool,
    /// Buffer size of each event subscription.
    pub event_channel_capacity: usize,
    /// Where to journal events. No journal when unset.
    pub journal_path: Option<PathBuf>,
    pub journal_sync: SyncMode,
    /// Deployed component addresses by name.
    pub components: BTreeMap<String, Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strict_parents: false,
            enforce_ancestry: false,
            event_channel_capacity: 1024,
            journal_path: None,
            journal_sync: SyncMode::default(),
            components: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            strict_parents: self.strict_parents,
        }
    }

    pub fn branch_config(&self) -> BranchConfig {
        BranchConfig {
            enforce_ancestry: self.enforce_ancestry,
        }
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            channel_capacity: self.event_channel_capacity,
        }
    }

    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            sync_mode: self.journal_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = LedgerConfig::default();
        assert!(!c.strict_parents);
        assert!(!c.enforce_ancestry);
        assert_eq!(c.event_channel_capacity, 1024);
        assert!(c.journal_path.is_none());
        assert_eq!(c.journal_sync, SyncMode::OsDefault);
        assert!(c.components.is_empty());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(LedgerConfig::from_toml_str("").unwrap(), LedgerConfig::default());
    }

    #[test]
    fn full_toml() {
        let c = LedgerConfig::from_toml_str(
            r#"
            strict_parents = true
            enforce_ancestry = true
            event_channel_capacity = 16
            journal_path = "var/ledger.journal"
            journal_sync = "every-write"

            [components]
            CommitLedger = "0x1111111111111111111111111111111111111111"
            BranchManager = "2222222222222222222222222222222222222222"
            "#,
        )
        .unwrap();

        assert!(c.store_config().strict_parents);
        assert!(c.branch_config().enforce_ancestry);
        assert_eq!(c.notifier_config().channel_capacity, 16);
        assert_eq!(c.journal_path, Some(PathBuf::from("var/ledger.journal")));
        assert_eq!(c.journal_config().sync_mode, SyncMode::EveryWrite);
        assert_eq!(
            c.components["BranchManager"],
            Address::from_raw([0x22; 20])
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            LedgerConfig::from_toml_str("event_channel_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LedgerConfig::from_toml_str("journal_sync = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            LedgerConfig::from_toml_str("[components]\nCommitLedger = \"0x12\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "strict_parents = true\n").unwrap();
        assert!(LedgerConfig::load(&path).unwrap().strict_parents);

        let missing = LedgerConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("nope.toml"));
    }
}
