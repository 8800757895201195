//! Foundation types for the federated-learning provenance ledger.
//!
//! Every other `flvcs-*` crate depends on this one. It carries the
//! identifiers that flow through the ledger and the single error taxonomy
//! that every mutating operation reports through.
//!
//! # Key Types
//!
//! - [`Digest`]: fixed-size 32-byte hash (commit ids, content digests, name ids)
//! - [`Address`]: authenticated caller identity
//! - [`Timestamp`]: execution-context time in UNIX seconds
//! - [`ExecutionContext`]: caller + timestamp handed to every write
//! - [`LedgerError`]: `NotAuthorized`, `AlreadyExists`, `DoesNotExist`, ...

pub mod address;
pub mod context;
pub mod digest;
pub mod error;
pub mod temporal;

pub use address::Address;
pub use context::ExecutionContext;
pub use digest::{BranchId, CommitId, Digest, PolicyId, TagId};
pub use error::{Authority, Entity, LedgerError, LedgerResult, TypeError};
pub use temporal::Timestamp;
