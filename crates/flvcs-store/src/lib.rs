//! Append-only commit store for federated-learning rounds.
//!
//! Each [`Commit`] records one aggregation round: which clients took part,
//! which hyperparameters were used, where the resulting artifact lives, and
//! how it scored. Commits are never updated or deleted; the only mutable
//! records here are [`Tag`]s, named pointers at commits.
//!
//! Commit ids are computed off-ledger. By default the store only checks that
//! an id is non-null and unused; a [`CommitVerifier`] can be injected to
//! recompute the id or check the aggregator's signature.

pub mod commit;
pub mod store;
pub mod verify;

pub use commit::{Commit, CommitInput, Scores, Tag, MAX_PARENTS, MIN_PARENTS};
pub use store::{CommitStore, StoreConfig};
pub use verify::{
    canonical_commit_id, AcceptAll, AggregatorSignatureVerifier, CommitVerifier, DigestVerifier,
    VerifierChain,
};
