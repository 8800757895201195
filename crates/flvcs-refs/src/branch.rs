use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use flvcs_access::AccessControl;
use flvcs_crypto::DomainHasher;
use flvcs_events::{EventPayload, HeadMotion};
use flvcs_policy::PolicyRegistry;
use flvcs_store::CommitStore;
use flvcs_types::{
    BranchId, CommitId, Entity, ExecutionContext, LedgerError, LedgerResult, PolicyId, Timestamp,
};

/// A named pointer at a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Current head. Always a stored commit.
    pub head: CommitId,
    /// Linked acceptance policy. May dangle if the policy is later removed.
    pub policy_id: Option<PolicyId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Switches for head movement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Require advances to move to a descendant of the current head and
    /// rollbacks to move to an ancestor of it.
    #[serde(default)]
    pub enforce_ancestry: bool,
}

/// Branches keyed by the hash of their name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BranchManager {
    branches: BTreeMap<BranchId, Branch>,
    #[serde(skip)]
    config: BranchConfig,
}

impl BranchManager {
    pub fn new(config: BranchConfig) -> Self {
        Self {
            branches: BTreeMap::new(),
            config,
        }
    }

    pub fn set_config(&mut self, config: BranchConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &BranchConfig {
        &self.config
    }

    /// Deterministic id for a branch name.
    pub fn branch_id(name: &str) -> BranchId {
        DomainHasher::BRANCH.name_id(name)
    }

    /// Create branch `name` at `head`.
    ///
    /// A `policy_id` of the null digest means no policy.
    #[allow(clippy::too_many_arguments)]
    pub fn create_branch(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        commits: &CommitStore,
        policies: &PolicyRegistry,
        name: &str,
        head: CommitId,
        policy_id: Option<PolicyId>,
    ) -> LedgerResult<EventPayload> {
        acl.require_owner_or_admin(&ctx.caller)?;

        let id = Self::branch_id(name);
        if self.branches.contains_key(&id) {
            return Err(LedgerError::already_exists(Entity::Branch, name));
        }
        if !commits.has_commit(&head) {
            return Err(LedgerError::precondition(format!(
                "head commit {head} does not exist"
            )));
        }
        let policy_id = policy_id.filter(|p| !p.is_null());
        if let Some(policy) = &policy_id {
            if !policies.contains(policy) {
                return Err(LedgerError::does_not_exist(Entity::Policy, policy));
            }
        }

        self.branches.insert(
            id,
            Branch {
                name: name.to_string(),
                head,
                policy_id,
                created_at: ctx.timestamp,
                updated_at: ctx.timestamp,
            },
        );

        debug!(branch = name, head = %head.short_hex(), has_policy = policy_id.is_some(), "branch created");
        Ok(EventPayload::BranchCreated {
            id,
            name: name.to_string(),
            head,
            policy_id,
        })
    }

    /// Move the head of `name` to `new_head`, intended as forward progress.
    pub fn advance(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        commits: &CommitStore,
        name: &str,
        new_head: CommitId,
    ) -> LedgerResult<EventPayload> {
        self.move_head(HeadMotion::Advance, ctx, acl, commits, name, new_head)
    }

    /// Move the head of `name` back to `target`.
    pub fn rollback(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        commits: &CommitStore,
        name: &str,
        target: CommitId,
    ) -> LedgerResult<EventPayload> {
        self.move_head(HeadMotion::Rollback, ctx, acl, commits, name, target)
    }

    fn move_head(
        &mut self,
        motion: HeadMotion,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        commits: &CommitStore,
        name: &str,
        new_head: CommitId,
    ) -> LedgerResult<EventPayload> {
        acl.require_owner_or_admin(&ctx.caller)?;

        let id = Self::branch_id(name);
        let branch = self
            .branches
            .get_mut(&id)
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Branch, name))?;
        if !commits.has_commit(&new_head) {
            return Err(LedgerError::precondition(format!(
                "commit {new_head} does not exist"
            )));
        }

        let old_head = branch.head;
        if self.config.enforce_ancestry {
            let related = match motion {
                HeadMotion::Advance => commits.is_ancestor(&old_head, &new_head),
                HeadMotion::Rollback => commits.is_ancestor(&new_head, &old_head),
            };
            if !related {
                return Err(LedgerError::precondition(format!(
                    "{motion} of '{name}' from {old_head} to {new_head} breaks ancestry"
                )));
            }
        }

        branch.head = new_head;
        branch.updated_at = ctx.timestamp;

        debug!(
            branch = name,
            %motion,
            old = %old_head.short_hex(),
            new = %new_head.short_hex(),
            "branch head moved"
        );
        Ok(EventPayload::HeadMoved {
            id,
            name: name.to_string(),
            motion,
            old_head,
            new_head,
        })
    }

    pub fn get_branch(&self, name: &str) -> LedgerResult<&Branch> {
        self.branches
            .get(&Self::branch_id(name))
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Branch, name))
    }

    pub fn branch_by_id(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.get(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(&Self::branch_id(name))
    }

    /// All branches in id order.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> + '_ {
        self.branches.values()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flvcs_store::CommitInput;
    use flvcs_types::{Address, Digest};

    fn owner() -> Address {
        Address::from_raw([1; 20])
    }

    fn at(secs: u64) -> ExecutionContext {
        ExecutionContext::new(owner(), Timestamp::from_secs(secs))
    }

    fn id(n: u8) -> CommitId {
        Digest::from_hash([n; 32])
    }

    struct Fixture {
        acl: AccessControl,
        commits: CommitStore,
        policies: PolicyRegistry,
        branches: BranchManager,
    }

    /// Commits 1 <- 2 <- 3 and a side commit 4 <- 1.
    fn fixture(config: BranchConfig) -> Fixture {
        let acl = AccessControl::new(owner()).unwrap();
        let mut commits = CommitStore::default();
        for (n, parent) in [(1u8, Digest::null()), (2, id(1)), (3, id(2)), (4, id(1))] {
            commits
                .add_commit(&at(1), &acl, CommitInput::new(id(n), vec![parent], n as u64, "uri"))
                .unwrap();
        }
        Fixture {
            acl,
            commits,
            policies: PolicyRegistry::new(),
            branches: BranchManager::new(config),
        }
    }

    impl Fixture {
        fn create(&mut self, name: &str, head: CommitId) -> LedgerResult<EventPayload> {
            self.branches.create_branch(
                &at(10),
                &self.acl,
                &self.commits,
                &self.policies,
                name,
                head,
                None,
            )
        }
    }

    // ------------------------------------------------------------------
    // create_branch
    // ------------------------------------------------------------------

    #[test]
    fn create_then_lookup() {
        let mut f = fixture(BranchConfig::default());
        let event = f.create("main", id(1)).unwrap();
        assert!(matches!(event, EventPayload::BranchCreated { head, .. } if head == id(1)));

        let branch = f.branches.get_branch("main").unwrap();
        assert_eq!(branch.head, id(1));
        assert_eq!(branch.policy_id, None);
        assert_eq!(branch.created_at, Timestamp::from_secs(10));
        assert!(f.branches.contains("main"));
        assert_eq!(
            f.branches.branch_by_id(&BranchManager::branch_id("main")),
            Some(branch)
        );
    }

    #[test]
    fn duplicate_name_fails() {
        let mut f = fixture(BranchConfig::default());
        f.create("main", id(1)).unwrap();
        let err = f.create("main", id(2)).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(f.branches.get_branch("main").unwrap().head, id(1));
    }

    #[test]
    fn unknown_head_is_a_precondition_failure() {
        let mut f = fixture(BranchConfig::default());
        let err = f.create("main", id(9)).unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
        assert!(f.branches.is_empty());
    }

    #[test]
    fn policy_link_must_resolve() {
        let mut f = fixture(BranchConfig::default());
        let ghost = PolicyRegistry::policy_id("ghost");
        let err = f
            .branches
            .create_branch(&at(1), &f.acl, &f.commits, &f.policies, "main", id(1), Some(ghost))
            .unwrap_err();
        assert_eq!(err, LedgerError::does_not_exist(Entity::Policy, ghost));

        let (strict, _) = f
            .policies
            .upsert_policy(&at(1), &f.acl, "strict", 9_000, true, "")
            .unwrap();
        f.branches
            .create_branch(&at(1), &f.acl, &f.commits, &f.policies, "main", id(1), Some(strict))
            .unwrap();
        assert_eq!(f.branches.get_branch("main").unwrap().policy_id, Some(strict));
    }

    #[test]
    fn null_policy_means_none() {
        let mut f = fixture(BranchConfig::default());
        f.branches
            .create_branch(
                &at(1),
                &f.acl,
                &f.commits,
                &f.policies,
                "main",
                id(1),
                Some(Digest::null()),
            )
            .unwrap();
        assert_eq!(f.branches.get_branch("main").unwrap().policy_id, None);
    }

    #[test]
    fn create_requires_a_role() {
        let mut f = fixture(BranchConfig::default());
        let stranger = ExecutionContext::new(Address::from_raw([5; 20]), Timestamp::from_secs(1));
        let err = f
            .branches
            .create_branch(&stranger, &f.acl, &f.commits, &f.policies, "main", id(9), None)
            .unwrap_err();
        assert!(err.is_not_authorized());
    }

    // ------------------------------------------------------------------
    // advance / rollback
    // ------------------------------------------------------------------

    #[test]
    fn advance_ignores_ancestry_by_default() {
        let mut f = fixture(BranchConfig::default());
        f.create("main", id(3)).unwrap();

        f.branches
            .advance(&at(20), &f.acl, &f.commits, "main", id(4))
            .unwrap();
        let event = f
            .branches
            .advance(&at(30), &f.acl, &f.commits, "main", id(1))
            .unwrap();

        assert_eq!(
            event,
            EventPayload::HeadMoved {
                id: BranchManager::branch_id("main"),
                name: "main".into(),
                motion: HeadMotion::Advance,
                old_head: id(4),
                new_head: id(1),
            }
        );
        let branch = f.branches.get_branch("main").unwrap();
        assert_eq!(branch.head, id(1));
        assert_eq!(branch.updated_at, Timestamp::from_secs(30));
        assert_eq!(branch.created_at, Timestamp::from_secs(10));
    }

    #[test]
    fn rollback_is_the_same_move_with_another_label() {
        let mut f = fixture(BranchConfig::default());
        f.create("main", id(1)).unwrap();
        let event = f
            .branches
            .rollback(&at(20), &f.acl, &f.commits, "main", id(3))
            .unwrap();
        assert!(matches!(
            event,
            EventPayload::HeadMoved { motion: HeadMotion::Rollback, .. }
        ));
        assert_eq!(f.branches.get_branch("main").unwrap().head, id(3));
    }

    #[test]
    fn move_on_unknown_branch_fails() {
        let mut f = fixture(BranchConfig::default());
        let err = f
            .branches
            .advance(&at(1), &f.acl, &f.commits, "nope", id(1))
            .unwrap_err();
        assert_eq!(err, LedgerError::does_not_exist(Entity::Branch, "nope"));
    }

    #[test]
    fn move_to_unknown_commit_fails_without_change() {
        let mut f = fixture(BranchConfig::default());
        f.create("main", id(1)).unwrap();
        let err = f
            .branches
            .rollback(&at(2), &f.acl, &f.commits, "main", id(9))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
        assert_eq!(f.branches.get_branch("main").unwrap().head, id(1));
    }

    #[test]
    fn ancestry_enforcement() {
        let mut f = fixture(BranchConfig {
            enforce_ancestry: true,
        });
        f.create("main", id(1)).unwrap();

        f.branches
            .advance(&at(2), &f.acl, &f.commits, "main", id(3))
            .unwrap();

        // 4 is on a side line, not a descendant of 3.
        let err = f
            .branches
            .advance(&at(3), &f.acl, &f.commits, "main", id(4))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));

        // Rolling forward is not a rollback.
        f.branches
            .rollback(&at(4), &f.acl, &f.commits, "main", id(2))
            .unwrap();
        assert!(f
            .branches
            .rollback(&at(5), &f.acl, &f.commits, "main", id(3))
            .is_err());
        assert_eq!(f.branches.get_branch("main").unwrap().head, id(2));
    }

    #[test]
    fn branches_list_and_serde() {
        let mut f = fixture(BranchConfig {
            enforce_ancestry: true,
        });
        f.create("main", id(1)).unwrap();
        f.create("experiment", id(4)).unwrap();
        assert_eq!(f.branches.len(), 2);
        assert_eq!(f.branches.branches().count(), 2);

        let json = serde_json::to_string(&f.branches).unwrap();
        let back: BranchManager = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_branch("experiment").unwrap().head, id(4));
        assert!(!back.config().enforce_ancestry);
    }
}
