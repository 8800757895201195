use serde::{Deserialize, Serialize};

use flvcs_types::{Address, CommitId, Digest, ExecutionContext, Timestamp};

/// Fewest parents a commit may name.
pub const MIN_PARENTS: usize = 1;
/// Most parents a commit may name (a merge of two lines).
pub const MAX_PARENTS: usize = 2;

/// Evaluation scores, fixed-point scaled by 10^4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scores {
    pub acc_times_1e4: u32,
    pub loss_times_1e4: u32,
}

impl Scores {
    pub fn new(acc_times_1e4: u32, loss_times_1e4: u32) -> Self {
        Self {
            acc_times_1e4,
            loss_times_1e4,
        }
    }
}

/// A commit as submitted by a caller, before the store stamps it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInput {
    pub id: CommitId,
    /// One parent for a normal round, two for a merge. A first round names
    /// the null digest as its single parent.
    pub parents: Vec<CommitId>,
    pub round: u64,
    pub clients_hash: Digest,
    pub hyperparams_hash: Digest,
    pub artifact_hash: Digest,
    /// Where the artifact bytes can be fetched. Must be non-empty.
    pub artifact_uri: String,
    pub scores: Option<Scores>,
    /// Opaque signature from the aggregator that produced the round.
    pub aggregator_sig: Vec<u8>,
}

impl CommitInput {
    /// Minimal input: id, parents, round and artifact location. The content
    /// digests start null and can be set with the `with_*` builders.
    pub fn new(
        id: CommitId,
        parents: Vec<CommitId>,
        round: u64,
        artifact_uri: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parents,
            round,
            clients_hash: Digest::null(),
            hyperparams_hash: Digest::null(),
            artifact_hash: Digest::null(),
            artifact_uri: artifact_uri.into(),
            scores: None,
            aggregator_sig: Vec::new(),
        }
    }

    /// Input for a first round, parented on the null digest.
    pub fn root(id: CommitId, round: u64, artifact_uri: impl Into<String>) -> Self {
        Self::new(id, vec![Digest::null()], round, artifact_uri)
    }

    pub fn with_clients_hash(mut self, hash: Digest) -> Self {
        self.clients_hash = hash;
        self
    }

    pub fn with_hyperparams_hash(mut self, hash: Digest) -> Self {
        self.hyperparams_hash = hash;
        self
    }

    pub fn with_artifact_hash(mut self, hash: Digest) -> Self {
        self.artifact_hash = hash;
        self
    }

    pub fn with_scores(mut self, scores: Scores) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn with_aggregator_sig(mut self, sig: Vec<u8>) -> Self {
        self.aggregator_sig = sig;
        self
    }

    /// Replace the id with the canonical digest of the other fields.
    pub fn with_canonical_id(mut self) -> Self {
        self.id = crate::verify::canonical_commit_id(&self);
        self
    }
}

/// A stored commit. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
    pub round: u64,
    pub clients_hash: Digest,
    pub hyperparams_hash: Digest,
    pub artifact_hash: Digest,
    pub artifact_uri: String,
    pub scores: Option<Scores>,
    pub aggregator_sig: Vec<u8>,
    /// Execution time of the write that stored it.
    pub timestamp: Timestamp,
    /// Caller that stored it.
    pub submitter: Address,
}

impl Commit {
    /// Stamp an input with the writing context.
    pub(crate) fn stamp(input: CommitInput, ctx: &ExecutionContext) -> Self {
        Self {
            id: input.id,
            parents: input.parents,
            round: input.round,
            clients_hash: input.clients_hash,
            hyperparams_hash: input.hyperparams_hash,
            artifact_hash: input.artifact_hash,
            artifact_uri: input.artifact_uri,
            scores: input.scores,
            aggregator_sig: input.aggregator_sig,
            timestamp: ctx.timestamp,
            submitter: ctx.caller,
        }
    }

    /// First parent, the line this round continued.
    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parents.first()
    }

    /// A first round: its only parent is the null digest.
    pub fn is_root(&self) -> bool {
        self.parents.iter().all(Digest::is_null)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() == MAX_PARENTS
    }
}

/// A named pointer at a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitId,
}
