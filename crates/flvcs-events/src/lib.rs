//! Change notifications for the FL provenance ledger.
//!
//! Every successful mutation produces exactly one [`EventPayload`]. The
//! [`Notifier`] stamps it into a sequenced, hash-chained [`LedgerEvent`],
//! appends it to the optional on-disk [`EventJournal`], and fans it out to
//! filtered subscribers over broadcast channels. Subscribing is the only way
//! observers learn about state changes.

pub mod error;
pub mod event;
pub mod journal;
pub mod notifier;

pub use error::{JournalError, JournalResult};
pub use event::{EventKind, EventPayload, HeadMotion, LedgerEvent};
pub use journal::{EventJournal, JournalConfig, SyncMode};
pub use notifier::{EventFilter, EventStream, Notifier, NotifierConfig};
