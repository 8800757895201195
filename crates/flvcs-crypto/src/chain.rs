use flvcs_types::Digest;

use crate::hasher::DomainHasher;

/// A record that participates in a hash chain.
pub trait Chained {
    /// The record's own hash.
    fn chain_hash(&self) -> Digest;
    /// The previous record's hash (`None` for the first record).
    fn prev_hash(&self) -> Option<Digest>;
    /// Why a record's payload could not be encoded.
    type EncodeError: std::fmt::Display;

    /// Canonical payload bytes covered by the hash.
    fn payload_bytes(&self) -> Result<Vec<u8>, Self::EncodeError>;
}

/// Hash chain integrity verifier.
///
/// Each record's hash covers its payload and the previous record's hash, so
/// editing, dropping, or reordering any record breaks every later link.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of records.
    ///
    /// Checks that the first record has no previous hash, that every later
    /// record links to its predecessor, and that every hash matches its
    /// payload.
    pub fn verify_chain(records: &[impl Chained]) -> Result<(), ChainError> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        if first.prev_hash().is_some() {
            return Err(ChainError::GenesisHasPrevHash);
        }
        Self::check_hash(first, 0, None)?;

        for (index, pair) in records.windows(2).enumerate() {
            let index = index + 1;
            let expected_prev = pair[0].chain_hash();
            match pair[1].prev_hash() {
                Some(prev) if prev == expected_prev => {}
                Some(_) => return Err(ChainError::BrokenLink { index }),
                None => return Err(ChainError::MissingPrevHash { index }),
            }

            Self::check_hash(&pair[1], index, Some(expected_prev))?;
        }

        Ok(())
    }

    fn check_hash<C: Chained>(
        record: &C,
        index: usize,
        prev_hash: Option<Digest>,
    ) -> Result<(), ChainError> {
        let payload = record
            .payload_bytes()
            .map_err(|e| ChainError::Encoding {
                index,
                reason: e.to_string(),
            })?;
        if Self::compute_hash(&payload, prev_hash) != record.chain_hash() {
            return Err(ChainError::HashMismatch { index });
        }
        Ok(())
    }

    /// Compute the chained hash for a payload and optional predecessor.
    pub fn compute_hash(payload: &[u8], prev_hash: Option<Digest>) -> Digest {
        match prev_hash {
            Some(prev) => DomainHasher::EVENT.hash_fields(&[prev.as_bytes(), payload]),
            None => DomainHasher::EVENT.hash_fields(&[payload]),
        }
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first record has a previous hash")]
    GenesisHasPrevHash,

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: usize },

    #[error("missing prev_hash at index {index}")]
    MissingPrevHash { index: usize },

    #[error("hash mismatch at index {index}")]
    HashMismatch { index: usize },

    #[error("record at index {index} could not be encoded: {reason}")]
    Encoding { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record {
        hash: Digest,
        prev: Option<Digest>,
        payload: Vec<u8>,
        unencodable: bool,
    }

    impl Chained for Record {
        type EncodeError = &'static str;

        fn chain_hash(&self) -> Digest {
            self.hash
        }
        fn prev_hash(&self) -> Option<Digest> {
            self.prev
        }
        fn payload_bytes(&self) -> Result<Vec<u8>, Self::EncodeError> {
            if self.unencodable {
                return Err("payload too large");
            }
            Ok(self.payload.clone())
        }
    }

    fn build_chain(count: usize) -> Vec<Record> {
        let mut chain = Vec::new();
        let mut prev = None;
        for i in 0..count {
            let payload = format!("event-{i}").into_bytes();
            let hash = HashChainVerifier::compute_hash(&payload, prev);
            chain.push(Record {
                hash,
                prev,
                payload,
                unencodable: false,
            });
            prev = Some(hash);
        }
        chain
    }

    #[test]
    fn empty_and_valid_chains_pass() {
        assert!(HashChainVerifier::verify_chain(&build_chain(0)).is_ok());
        assert!(HashChainVerifier::verify_chain(&build_chain(1)).is_ok());
        assert!(HashChainVerifier::verify_chain(&build_chain(8)).is_ok());
    }

    #[test]
    fn genesis_with_prev_hash_fails() {
        let mut chain = build_chain(1);
        chain[0].prev = Some(Digest::from_hash([1; 32]));
        assert_eq!(
            HashChainVerifier::verify_chain(&chain),
            Err(ChainError::GenesisHasPrevHash)
        );
    }

    #[test]
    fn dropped_record_breaks_link() {
        let mut chain = build_chain(4);
        chain.remove(1);
        assert_eq!(
            HashChainVerifier::verify_chain(&chain),
            Err(ChainError::BrokenLink { index: 1 })
        );
    }

    #[test]
    fn missing_prev_hash_detected() {
        let mut chain = build_chain(3);
        chain[2].prev = None;
        assert_eq!(
            HashChainVerifier::verify_chain(&chain),
            Err(ChainError::MissingPrevHash { index: 2 })
        );
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3);
        chain[1].payload = b"tampered".to_vec();
        assert_eq!(
            HashChainVerifier::verify_chain(&chain),
            Err(ChainError::HashMismatch { index: 1 })
        );
    }

    #[test]
    fn unencodable_record_is_reported() {
        let mut chain = build_chain(3);
        chain[2].unencodable = true;
        assert_eq!(
            HashChainVerifier::verify_chain(&chain),
            Err(ChainError::Encoding {
                index: 2,
                reason: "payload too large".into()
            })
        );
    }
}
