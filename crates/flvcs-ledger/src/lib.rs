//! # flvcs-ledger
//!
//! The federated-learning provenance ledger as one embeddable value.
//!
//! [`Ledger`] owns the access control table, the policy registry, the commit
//! store and the branch manager behind a single lock. Every write runs
//! authorization, validation and mutation as one atomic step and then emits
//! exactly one [`LedgerEvent`](flvcs_events::LedgerEvent); a failed write
//! changes nothing and emits nothing.
//!
//! # Quick start
//!
//! ```
//! use flvcs_ledger::{Ledger, LedgerConfig};
//! use flvcs_store::CommitInput;
//! use flvcs_types::{Address, Digest};
//!
//! let owner = Address::from_raw([1; 20]);
//! let ledger = Ledger::open(owner, LedgerConfig::default()).unwrap();
//!
//! let c1 = Digest::from_bytes(b"round-1");
//! ledger
//!     .add_commit(owner, CommitInput::root(c1, 1, "ipfs://round-1"))
//!     .unwrap();
//! ledger.create_branch(owner, "main", c1, None).unwrap();
//! assert_eq!(ledger.get_branch("main").unwrap().head, c1);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locator;
pub mod snapshot;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{ConfigError, LocatorError, OpenError, SnapshotError};
pub use ledger::{Ledger, LedgerState};
pub use locator::ComponentLocator;
pub use snapshot::LedgerSnapshot;
