use flvcs_types::Digest;

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher prepends a domain tag to its input, so a policy and a branch
/// that share a name still get distinct ids, and a name id can never collide
/// with a commit id computed under another domain.
#[derive(Clone, Copy, Debug)]
pub struct DomainHasher {
    domain: &'static str,
}

impl DomainHasher {
    /// Policy ids, derived from the policy name.
    pub const POLICY: Self = Self::new("flvcs-policy-v1");
    /// Tag ids, derived from the tag name.
    pub const TAG: Self = Self::new("flvcs-tag-v1");
    /// Branch ids, derived from the branch name.
    pub const BRANCH: Self = Self::new("flvcs-branch-v1");
    /// Component locator keys, derived from the component name.
    pub const COMPONENT: Self = Self::new("flvcs-component-v1");
    /// Canonical commit encodings.
    pub const COMMIT: Self = Self::new("flvcs-commit-v1");
    /// Journal event chaining.
    pub const EVENT: Self = Self::new("flvcs-event-v1");

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a sequence of fields, length-prefixing each so that field
    /// boundaries are unambiguous.
    pub fn hash_fields(&self, fields: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Deterministic id for a human-readable name.
    pub fn name_id(&self, name: &str) -> Digest {
        self.hash(name.as_bytes())
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
