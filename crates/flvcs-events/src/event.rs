use serde::{Deserialize, Serialize};

use flvcs_crypto::{Chained, HashChainVerifier};
use flvcs_types::{Address, BranchId, CommitId, Digest, PolicyId, TagId, Timestamp};

use crate::error::{JournalError, JournalResult};

/// Semantic label of a branch head reassignment.
///
/// Advance and rollback are mechanically identical; the label only tells
/// observers what the caller meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadMotion {
    Advance,
    Rollback,
}

impl std::fmt::Display for HeadMotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advance => write!(f, "advance"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Classification of ledger events, used for subscription filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    OwnershipTransferred,
    AdminGranted,
    AdminRevoked,
    PolicyUpserted,
    PolicyRemoved,
    CommitAdded,
    TagSet,
    BranchCreated,
    BranchAdvanced,
    BranchRolledBack,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OwnershipTransferred => "OwnershipTransferred",
            Self::AdminGranted => "AdminGranted",
            Self::AdminRevoked => "AdminRevoked",
            Self::PolicyUpserted => "PolicyUpserted",
            Self::PolicyRemoved => "PolicyRemoved",
            Self::CommitAdded => "CommitAdded",
            Self::TagSet => "TagSet",
            Self::BranchCreated => "BranchCreated",
            Self::BranchAdvanced => "BranchAdvanced",
            Self::BranchRolledBack => "BranchRolledBack",
        };
        write!(f, "{s}")
    }
}

/// What changed. One variant per successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    OwnershipTransferred {
        previous: Address,
        new_owner: Address,
    },
    AdminGranted {
        admin: Address,
    },
    AdminRevoked {
        admin: Address,
    },
    PolicyUpserted {
        id: PolicyId,
        name: String,
        min_accuracy: u32,
        dp_required: bool,
        anomaly_filter: String,
    },
    PolicyRemoved {
        id: PolicyId,
    },
    CommitAdded {
        id: CommitId,
        round: u64,
        parents: Vec<CommitId>,
        artifact_uri: String,
    },
    TagSet {
        id: TagId,
        name: String,
        commit: CommitId,
        previous: Option<CommitId>,
    },
    BranchCreated {
        id: BranchId,
        name: String,
        head: CommitId,
        policy_id: Option<PolicyId>,
    },
    HeadMoved {
        id: BranchId,
        name: String,
        motion: HeadMotion,
        old_head: CommitId,
        new_head: CommitId,
    },
}

impl EventPayload {
    /// The filterable kind of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OwnershipTransferred { .. } => EventKind::OwnershipTransferred,
            Self::AdminGranted { .. } => EventKind::AdminGranted,
            Self::AdminRevoked { .. } => EventKind::AdminRevoked,
            Self::PolicyUpserted { .. } => EventKind::PolicyUpserted,
            Self::PolicyRemoved { .. } => EventKind::PolicyRemoved,
            Self::CommitAdded { .. } => EventKind::CommitAdded,
            Self::TagSet { .. } => EventKind::TagSet,
            Self::BranchCreated { .. } => EventKind::BranchCreated,
            Self::HeadMoved {
                motion: HeadMotion::Advance,
                ..
            } => EventKind::BranchAdvanced,
            Self::HeadMoved {
                motion: HeadMotion::Rollback,
                ..
            } => EventKind::BranchRolledBack,
        }
    }
}

/// A sealed notification: sequenced, attributed, and hash-chained to its
/// predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the ledger's total write order, starting at 1.
    pub seq: u64,
    /// Execution time of the write.
    pub timestamp: Timestamp,
    /// Caller that performed the write.
    pub actor: Address,
    pub kind: EventKind,
    pub payload: EventPayload,
    /// Hash of the previous event (`None` for the first event).
    pub prev_hash: Option<Digest>,
    /// Hash over this event's fields and `prev_hash`.
    pub event_hash: Digest,
}

impl LedgerEvent {
    /// Seal a payload into an event chained after `prev_hash`.
    pub fn seal(
        seq: u64,
        timestamp: Timestamp,
        actor: Address,
        payload: EventPayload,
        prev_hash: Option<Digest>,
    ) -> JournalResult<Self> {
        let kind = payload.kind();
        let body = Self::encode_body(seq, timestamp, actor, &payload)?;
        let event_hash = HashChainVerifier::compute_hash(&body, prev_hash);
        Ok(Self {
            seq,
            timestamp,
            actor,
            kind,
            payload,
            prev_hash,
            event_hash,
        })
    }

    /// Recompute the event hash and compare it against the stored one.
    pub fn verify_integrity(&self) -> bool {
        self.kind == self.payload.kind()
            && self.payload_bytes().is_ok_and(|body| {
                HashChainVerifier::compute_hash(&body, self.prev_hash) == self.event_hash
            })
    }

    fn encode_body(
        seq: u64,
        timestamp: Timestamp,
        actor: Address,
        payload: &EventPayload,
    ) -> JournalResult<Vec<u8>> {
        bincode::serialize(&(seq, timestamp, actor, payload))
            .map_err(|e| JournalError::Serialization(e.to_string()))
    }
}

impl Chained for LedgerEvent {
    type EncodeError = JournalError;

    fn chain_hash(&self) -> Digest {
        self.event_hash
    }

    fn prev_hash(&self) -> Option<Digest> {
        self.prev_hash
    }

    fn payload_bytes(&self) -> JournalResult<Vec<u8>> {
        Self::encode_body(self.seq, self.timestamp, self.actor, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_added() -> EventPayload {
        EventPayload::CommitAdded {
            id: Digest::from_hash([1; 32]),
            round: 1,
            parents: vec![Digest::null()],
            artifact_uri: "loc://1".into(),
        }
    }

    #[test]
    fn sealed_event_verifies() {
        let event = LedgerEvent::seal(
            1,
            Timestamp::from_secs(100),
            Address::from_raw([1; 20]),
            commit_added(),
            None,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::CommitAdded);
        assert!(event.verify_integrity());
    }

    #[test]
    fn tampered_payload_fails_integrity() {
        let mut event = LedgerEvent::seal(
            1,
            Timestamp::from_secs(100),
            Address::from_raw([1; 20]),
            commit_added(),
            None,
        )
        .unwrap();
        event.payload = EventPayload::PolicyRemoved {
            id: Digest::from_hash([2; 32]),
        };
        assert!(!event.verify_integrity());
    }

    #[test]
    fn chaining_changes_the_hash() {
        let ts = Timestamp::from_secs(5);
        let actor = Address::from_raw([3; 20]);
        let first = LedgerEvent::seal(1, ts, actor, commit_added(), None).unwrap();
        let linked =
            LedgerEvent::seal(1, ts, actor, commit_added(), Some(first.event_hash)).unwrap();
        assert_ne!(first.event_hash, linked.event_hash);
    }

    #[test]
    fn head_motion_selects_kind() {
        let moved = |motion| EventPayload::HeadMoved {
            id: Digest::from_hash([4; 32]),
            name: "main".into(),
            motion,
            old_head: Digest::from_hash([5; 32]),
            new_head: Digest::from_hash([6; 32]),
        };
        assert_eq!(moved(HeadMotion::Advance).kind(), EventKind::BranchAdvanced);
        assert_eq!(moved(HeadMotion::Rollback).kind(), EventKind::BranchRolledBack);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EventKind::TagSet.to_string(), "TagSet");
        assert_eq!(HeadMotion::Rollback.to_string(), "rollback");
    }
}
