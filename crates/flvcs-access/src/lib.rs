//! Role-based write authorization for the FL provenance ledger.
//!
//! One owner and a set of admins. The owner manages the admin set and may
//! hand ownership to another address; the owner or any admin may perform
//! ordinary ledger writes. Reads are never gated.

pub mod control;

pub use control::AccessControl;
