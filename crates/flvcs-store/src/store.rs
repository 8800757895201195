//! The commit store and its lineage queries.
//!
//! # Invariants
//!
//! - A stored commit is never modified or removed.
//! - Commit ids are non-null and unique for the store's lifetime.
//! - Every commit names one or two parents. Parents need not exist unless
//!   [`StoreConfig::strict_parents`] is set; traversals skip dangling ones.
//!   The null digest is the parent of a first round and is never looked up.
//! - A tag name maps to at most one commit, and that commit exists.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use flvcs_access::AccessControl;
use flvcs_crypto::DomainHasher;
use flvcs_events::EventPayload;
use flvcs_types::{CommitId, Entity, ExecutionContext, LedgerError, LedgerResult, TagId};

use crate::commit::{Commit, CommitInput, Tag, MAX_PARENTS, MIN_PARENTS};
use crate::verify::{AcceptAll, CommitVerifier};

/// Validation switches for [`CommitStore::add_commit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reject commits whose non-null parents are not stored.
    #[serde(default)]
    pub strict_parents: bool,
}

fn default_verifier() -> Arc<dyn CommitVerifier> {
    Arc::new(AcceptAll)
}

/// Commits by id and tags by name hash.
///
/// Only the records are serialized. Configuration and the verifier are
/// runtime settings and must be re-applied after deserializing.
#[derive(Clone, Serialize, Deserialize)]
pub struct CommitStore {
    commits: BTreeMap<CommitId, Commit>,
    tags: BTreeMap<TagId, Tag>,
    #[serde(skip)]
    config: StoreConfig,
    #[serde(skip, default = "default_verifier")]
    verifier: Arc<dyn CommitVerifier>,
}

impl CommitStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            commits: BTreeMap::new(),
            tags: BTreeMap::new(),
            config,
            verifier: default_verifier(),
        }
    }

    /// Replace the verification strategy.
    pub fn with_verifier(mut self, verifier: Arc<dyn CommitVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn set_config(&mut self, config: StoreConfig) {
        self.config = config;
    }

    pub fn set_verifier(&mut self, verifier: Arc<dyn CommitVerifier>) {
        self.verifier = verifier;
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Deterministic id for a tag name.
    pub fn tag_id(name: &str) -> TagId {
        DomainHasher::TAG.name_id(name)
    }

    // ---------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------

    pub fn has_commit(&self, id: &CommitId) -> bool {
        self.commits.contains_key(id)
    }

    /// Validate and store a commit, stamped with the caller and time.
    pub fn add_commit(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        input: CommitInput,
    ) -> LedgerResult<EventPayload> {
        acl.require_owner_or_admin(&ctx.caller)?;

        if input.id.is_null() {
            return Err(LedgerError::invalid_input("commit id must not be null"));
        }
        if self.commits.contains_key(&input.id) {
            return Err(LedgerError::already_exists(Entity::Commit, input.id));
        }
        if !(MIN_PARENTS..=MAX_PARENTS).contains(&input.parents.len()) {
            return Err(LedgerError::invalid_input(format!(
                "commit must have {MIN_PARENTS} or {MAX_PARENTS} parents, got {}",
                input.parents.len()
            )));
        }
        if input.artifact_uri.is_empty() {
            return Err(LedgerError::invalid_input("artifact uri must not be empty"));
        }
        if self.config.strict_parents {
            if let Some(missing) = input
                .parents
                .iter()
                .find(|p| !p.is_null() && !self.commits.contains_key(*p))
            {
                return Err(LedgerError::does_not_exist(Entity::Commit, missing));
            }
        }
        self.verifier.verify(&input)?;

        let commit = Commit::stamp(input, ctx);
        let event = EventPayload::CommitAdded {
            id: commit.id,
            round: commit.round,
            parents: commit.parents.clone(),
            artifact_uri: commit.artifact_uri.clone(),
        };

        debug!(
            commit = %commit.id.short_hex(),
            round = commit.round,
            parents = commit.parents.len(),
            submitter = %commit.submitter,
            verifier = self.verifier.name(),
            "commit added"
        );
        self.commits.insert(commit.id, commit);
        Ok(event)
    }

    pub fn get_commit(&self, id: &CommitId) -> LedgerResult<&Commit> {
        self.commits
            .get(id)
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Commit, id))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// All commit ids in ascending order.
    pub fn commit_ids(&self) -> impl Iterator<Item = &CommitId> + '_ {
        self.commits.keys()
    }

    // ---------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------

    /// Point tag `name` at `commit_id`, replacing any previous target.
    pub fn set_tag(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        name: &str,
        commit_id: CommitId,
    ) -> LedgerResult<EventPayload> {
        acl.require_owner_or_admin(&ctx.caller)?;

        if !self.commits.contains_key(&commit_id) {
            return Err(LedgerError::does_not_exist(Entity::Commit, commit_id));
        }

        let id = Self::tag_id(name);
        let previous = self
            .tags
            .insert(
                id,
                Tag {
                    name: name.to_string(),
                    commit: commit_id,
                },
            )
            .map(|old| old.commit);

        debug!(tag = name, commit = %commit_id.short_hex(), moved = previous.is_some(), "tag set");
        Ok(EventPayload::TagSet {
            id,
            name: name.to_string(),
            commit: commit_id,
            previous,
        })
    }

    pub fn tag(&self, name: &str) -> LedgerResult<&Tag> {
        self.tags
            .get(&Self::tag_id(name))
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Tag, name))
    }

    pub fn tag_by_id(&self, id: &TagId) -> LedgerResult<&Tag> {
        self.tags
            .get(id)
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Tag, id))
    }

    /// All tags in id order.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> + '_ {
        self.tags.values()
    }

    // ---------------------------------------------------------------
    // Lineage
    // ---------------------------------------------------------------

    /// Stored commits that name `id` as a parent, in id order.
    pub fn children(&self, id: &CommitId) -> Vec<&Commit> {
        self.commits
            .values()
            .filter(|c| c.parents.contains(id))
            .collect()
    }

    /// Stored ancestors of `id` up to `max_depth` generations, breadth first.
    ///
    /// The commit itself is not included. Dangling parents are skipped.
    pub fn ancestors(&self, id: &CommitId, max_depth: usize) -> Vec<&Commit> {
        let Some(start) = self.commits.get(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        visited.insert(*id);
        let mut result = Vec::new();
        let mut queue: VecDeque<(&CommitId, usize)> = VecDeque::new();

        for parent in &start.parents {
            if visited.insert(*parent) {
                queue.push_back((parent, 1));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            if depth > max_depth {
                continue;
            }
            if let Some(commit) = self.commits.get(current) {
                result.push(commit);
                if depth < max_depth {
                    for parent in &commit.parents {
                        if visited.insert(*parent) {
                            queue.push_back((parent, depth + 1));
                        }
                    }
                }
            }
        }

        result
    }

    /// Whether `ancestor` is reachable from `descendant` through stored
    /// parent links. A commit counts as its own ancestor.
    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> bool {
        if ancestor == descendant {
            return true;
        }
        self.ancestors(descendant, usize::MAX)
            .iter()
            .any(|c| c.id == *ancestor)
    }

    /// First-parent history of `id`, newest first, starting with `id`
    /// itself. Stops at the first parent that is not stored.
    pub fn lineage(&self, id: &CommitId) -> Vec<&Commit> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut cursor = self.commits.get(id);

        while let Some(commit) = cursor {
            if !seen.insert(commit.id) {
                break;
            }
            result.push(commit);
            cursor = commit.first_parent().and_then(|p| self.commits.get(p));
        }

        result
    }
}

impl Default for CommitStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for CommitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitStore")
            .field("commits", &self.commits.len())
            .field("tags", &self.tags.len())
            .field("config", &self.config)
            .field("verifier", &self.verifier.name())
            .finish()
    }
}
