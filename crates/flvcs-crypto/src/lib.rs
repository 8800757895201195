//! Cryptographic primitives for the FL provenance ledger.
//!
//! Provides domain-separated BLAKE3 hashing (used to derive policy, tag,
//! branch, and component ids from names), Ed25519 keys for aggregator
//! signatures, and hash-chain verification for the notification journal.
//!
//! All crypto operations wrap established libraries.

pub mod chain;
pub mod hasher;
pub mod signer;

pub use chain::{ChainError, Chained, HashChainVerifier};
pub use hasher::DomainHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
