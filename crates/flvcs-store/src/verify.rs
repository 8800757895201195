use std::sync::Arc;

use flvcs_crypto::{DomainHasher, Signature, VerifyingKey};
use flvcs_types::{CommitId, LedgerError, LedgerResult};

use crate::commit::CommitInput;

/// Check applied to a commit after shape validation and before it is stored.
pub trait CommitVerifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Return `VerificationFailed` to reject the commit.
    fn verify(&self, input: &CommitInput) -> LedgerResult<()>;
}

/// Digest of a commit's content under the commit domain.
///
/// Covers the parents, round, the three content digests and the artifact
/// location. Scores and the aggregator signature are not covered. Client
/// tooling computes commit ids with this when the ledger runs with a
/// [`DigestVerifier`].
pub fn canonical_commit_id(input: &CommitInput) -> CommitId {
    let parent_count = (input.parents.len() as u64).to_le_bytes();
    let round = input.round.to_le_bytes();

    let mut fields: Vec<&[u8]> = Vec::with_capacity(7 + input.parents.len());
    fields.push(&parent_count);
    for parent in &input.parents {
        fields.push(parent.as_bytes());
    }
    fields.push(&round);
    fields.push(input.clients_hash.as_bytes());
    fields.push(input.hyperparams_hash.as_bytes());
    fields.push(input.artifact_hash.as_bytes());
    fields.push(input.artifact_uri.as_bytes());

    DomainHasher::COMMIT.hash_fields(&fields)
}

/// Accepts every commit. The store's default.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl CommitVerifier for AcceptAll {
    fn name(&self) -> &str {
        "accept-all"
    }

    fn verify(&self, _input: &CommitInput) -> LedgerResult<()> {
        Ok(())
    }
}

/// Requires the commit id to equal [`canonical_commit_id`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestVerifier;

impl CommitVerifier for DigestVerifier {
    fn name(&self) -> &str {
        "digest"
    }

    fn verify(&self, input: &CommitInput) -> LedgerResult<()> {
        let expected = canonical_commit_id(input);
        if input.id == expected {
            Ok(())
        } else {
            Err(LedgerError::VerificationFailed(format!(
                "commit id {} does not match content digest {expected}",
                input.id
            )))
        }
    }
}

/// Requires `aggregator_sig` to be an Ed25519 signature over the commit id
/// bytes by one of the trusted aggregator keys.
#[derive(Clone, Debug, Default)]
pub struct AggregatorSignatureVerifier {
    trusted: Vec<VerifyingKey>,
}

impl AggregatorSignatureVerifier {
    pub fn new(trusted: impl IntoIterator<Item = VerifyingKey>) -> Self {
        Self {
            trusted: trusted.into_iter().collect(),
        }
    }

    pub fn trust(&mut self, key: VerifyingKey) {
        if !self.trusted.contains(&key) {
            self.trusted.push(key);
        }
    }

    pub fn trusted_count(&self) -> usize {
        self.trusted.len()
    }
}

impl CommitVerifier for AggregatorSignatureVerifier {
    fn name(&self) -> &str {
        "aggregator-signature"
    }

    fn verify(&self, input: &CommitInput) -> LedgerResult<()> {
        let signature = Signature::from_slice(&input.aggregator_sig)
            .map_err(|e| LedgerError::VerificationFailed(format!("aggregator signature: {e}")))?;

        let message = input.id.as_bytes();
        if self
            .trusted
            .iter()
            .any(|key| key.verify(message, &signature).is_ok())
        {
            Ok(())
        } else {
            Err(LedgerError::VerificationFailed(format!(
                "commit {} is not signed by a trusted aggregator",
                input.id
            )))
        }
    }
}

/// Runs verifiers in order; the first rejection wins.
#[derive(Clone, Default)]
pub struct VerifierChain {
    verifiers: Vec<Arc<dyn CommitVerifier>>,
}

impl VerifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, verifier: impl CommitVerifier + 'static) -> Self {
        self.verifiers.push(Arc::new(verifier));
        self
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl CommitVerifier for VerifierChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn verify(&self, input: &CommitInput) -> LedgerResult<()> {
        self.verifiers.iter().try_for_each(|v| v.verify(input))
    }
}

impl std::fmt::Debug for VerifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.verifiers.iter().map(|v| v.name()))
            .finish()
    }
}
