use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use flvcs_access::AccessControl;
use flvcs_events::{EventFilter, EventJournal, EventPayload, EventStream, LedgerEvent, Notifier};
use flvcs_policy::{Candidate, Policy, PolicyCheck, PolicyRegistry, PolicyVerdict};
use flvcs_refs::{Branch, BranchManager};
use flvcs_store::{Commit, CommitInput, CommitStore, CommitVerifier, Tag};
use flvcs_types::{Address, CommitId, ExecutionContext, LedgerError, LedgerResult, PolicyId};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{OpenError, SnapshotError};
use crate::locator::ComponentLocator;
use crate::snapshot::LedgerSnapshot;

/// Every persisted ledger table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerState {
    pub access: AccessControl,
    pub policies: PolicyRegistry,
    pub commits: CommitStore,
    pub branches: BranchManager,
}

impl LedgerState {
    pub fn new(access: AccessControl) -> Self {
        Self {
            access,
            policies: PolicyRegistry::new(),
            commits: CommitStore::default(),
            branches: BranchManager::default(),
        }
    }

    /// Re-apply runtime settings that are not part of the persisted tables.
    fn configure(&mut self, config: &LedgerConfig) {
        self.commits.set_config(config.store_config());
        self.branches.set_config(config.branch_config());
    }
}

fn poisoned<T>(_: PoisonError<T>) -> LedgerError {
    LedgerError::Internal("ledger state lock poisoned".into())
}

/// The FL provenance ledger.
///
/// Writes are serialized by one lock: each write authorizes, validates and
/// mutates against the state as it is while the lock is held, and its event
/// is emitted before the lock is released, so event order is write order.
/// Reads share the lock and only observe completed writes.
pub struct Ledger {
    state: RwLock<LedgerState>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    locator: ComponentLocator,
    config: LedgerConfig,
}

impl Ledger {
    /// A fresh ledger owned by `owner`.
    pub fn open(owner: Address, config: LedgerConfig) -> Result<Self, OpenError> {
        let state = LedgerState::new(AccessControl::new(owner)?);
        Self::assemble(state, config)
    }

    /// A ledger whose tables start from `snapshot`.
    ///
    /// Events continue the sequence the snapshot was taken at. With a
    /// journal configured, the journal must end at that same event.
    pub fn from_snapshot(snapshot: LedgerSnapshot, config: LedgerConfig) -> Result<Self, OpenError> {
        info!(
            taken_at = snapshot.taken_at.as_secs(),
            seq = snapshot.last_event_seq,
            "restoring ledger from snapshot"
        );
        let (seq, hash) = (snapshot.last_event_seq, snapshot.last_event_hash);
        let ledger = Self::assemble(snapshot.state, config)?;

        if ledger.notifier.journal().is_some() {
            let journal_seq = ledger.notifier.last_seq();
            if journal_seq != seq || ledger.notifier.last_hash() != hash {
                return Err(SnapshotError::JournalMismatch {
                    snapshot_seq: seq,
                    journal_seq,
                }
                .into());
            }
        } else {
            ledger.notifier.resume_at(seq, hash);
        }
        Ok(ledger)
    }

    /// Load a snapshot file and restore from it.
    pub fn restore(path: &Path, config: LedgerConfig) -> Result<Self, OpenError> {
        Self::from_snapshot(LedgerSnapshot::load(path)?, config)
    }

    fn assemble(mut state: LedgerState, config: LedgerConfig) -> Result<Self, OpenError> {
        state.configure(&config);
        let locator = ComponentLocator::from_table(&config.components)?;

        let notifier = match &config.journal_path {
            Some(path) => {
                let journal = EventJournal::open(path, config.journal_config())?;
                Notifier::with_journal(config.notifier_config(), journal)?
            }
            None => Notifier::new(config.notifier_config()),
        };

        info!(
            owner = %state.access.owner(),
            commits = state.commits.len(),
            branches = state.branches.len(),
            strict_parents = config.strict_parents,
            enforce_ancestry = config.enforce_ancestry,
            journal = config.journal_path.is_some(),
            components = locator.len(),
            "ledger opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            notifier,
            clock: Arc::new(SystemClock),
            locator,
            config,
        })
    }

    /// Use `clock` for write timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run `verifier` on every commit before it is stored.
    pub fn with_verifier(mut self, verifier: Arc<dyn CommitVerifier>) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .commits
            .set_verifier(verifier);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn locator(&self) -> &ComponentLocator {
        &self.locator
    }

    // ---------------------------------------------------------------
    // Write path
    // ---------------------------------------------------------------

    fn write<F>(&self, caller: Address, op: F) -> LedgerResult<LedgerEvent>
    where
        F: FnOnce(&mut LedgerState, &ExecutionContext) -> LedgerResult<EventPayload>,
    {
        let mut state = self.state.write().map_err(poisoned)?;
        let ctx = ExecutionContext::new(caller, self.clock.now());
        let payload = op(&mut *state, &ctx).inspect_err(|e| {
            debug!(%caller, error = %e, "write rejected");
        })?;
        self.notifier
            .emit(&ctx, payload)
            .map_err(|e| LedgerError::Internal(format!("event could not be sealed: {e}")))
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> LedgerResult<T> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(f(&state))
    }

    pub fn transfer_ownership(&self, caller: Address, new_owner: Address) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.access.transfer_ownership(ctx, new_owner))
    }

    pub fn grant_admin(&self, caller: Address, admin: Address) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.access.grant_admin(ctx, admin))
    }

    pub fn revoke_admin(&self, caller: Address, admin: Address) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.access.revoke_admin(ctx, admin))
    }

    pub fn upsert_policy(
        &self,
        caller: Address,
        name: &str,
        min_accuracy: u32,
        dp_required: bool,
        anomaly_filter: &str,
    ) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| {
            s.policies
                .upsert_policy(ctx, &s.access, name, min_accuracy, dp_required, anomaly_filter)
                .map(|(_, payload)| payload)
        })
    }

    pub fn remove_policy(&self, caller: Address, id: &PolicyId) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.policies.remove_policy(ctx, &s.access, id))
    }

    pub fn add_commit(&self, caller: Address, input: CommitInput) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.commits.add_commit(ctx, &s.access, input))
    }

    pub fn set_tag(&self, caller: Address, name: &str, commit: CommitId) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| s.commits.set_tag(ctx, &s.access, name, commit))
    }

    pub fn create_branch(
        &self,
        caller: Address,
        name: &str,
        head: CommitId,
        policy_id: Option<PolicyId>,
    ) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| {
            s.branches
                .create_branch(ctx, &s.access, &s.commits, &s.policies, name, head, policy_id)
        })
    }

    pub fn advance(&self, caller: Address, name: &str, new_head: CommitId) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| {
            s.branches.advance(ctx, &s.access, &s.commits, name, new_head)
        })
    }

    pub fn rollback(&self, caller: Address, name: &str, target: CommitId) -> LedgerResult<LedgerEvent> {
        self.write(caller, |s, ctx| {
            s.branches.rollback(ctx, &s.access, &s.commits, name, target)
        })
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn owner(&self) -> LedgerResult<Address> {
        self.read(|s| s.access.owner())
    }

    pub fn is_admin(&self, addr: &Address) -> LedgerResult<bool> {
        self.read(|s| s.access.is_admin(addr))
    }

    pub fn admins(&self) -> LedgerResult<Vec<Address>> {
        self.read(|s| s.access.admins().copied().collect())
    }

    pub fn has_commit(&self, id: &CommitId) -> LedgerResult<bool> {
        self.read(|s| s.commits.has_commit(id))
    }

    pub fn get_commit(&self, id: &CommitId) -> LedgerResult<Commit> {
        self.read(|s| s.commits.get_commit(id).cloned())?
    }

    pub fn commit_count(&self) -> LedgerResult<usize> {
        self.read(|s| s.commits.len())
    }

    pub fn ancestors(&self, id: &CommitId, max_depth: usize) -> LedgerResult<Vec<Commit>> {
        self.read(|s| s.commits.ancestors(id, max_depth).into_iter().cloned().collect())
    }

    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> LedgerResult<bool> {
        self.read(|s| s.commits.is_ancestor(ancestor, descendant))
    }

    pub fn lineage(&self, id: &CommitId) -> LedgerResult<Vec<Commit>> {
        self.read(|s| s.commits.lineage(id).into_iter().cloned().collect())
    }

    pub fn children(&self, id: &CommitId) -> LedgerResult<Vec<Commit>> {
        self.read(|s| s.commits.children(id).into_iter().cloned().collect())
    }

    pub fn tag(&self, name: &str) -> LedgerResult<Tag> {
        self.read(|s| s.commits.tag(name).cloned())?
    }

    pub fn tags(&self) -> LedgerResult<Vec<Tag>> {
        self.read(|s| s.commits.tags().cloned().collect())
    }

    pub fn get_policy(&self, id: &PolicyId) -> LedgerResult<Policy> {
        self.read(|s| s.policies.get_policy(id).cloned())?
    }

    pub fn policies(&self) -> LedgerResult<Vec<(PolicyId, Policy)>> {
        self.read(|s| s.policies.policies().map(|(id, p)| (*id, p.clone())).collect())
    }

    pub fn get_branch(&self, name: &str) -> LedgerResult<Branch> {
        self.read(|s| s.branches.get_branch(name).cloned())?
    }

    pub fn branches(&self) -> LedgerResult<Vec<Branch>> {
        self.read(|s| s.branches.branches().cloned().collect())
    }

    /// Check `commit` against the policy linked from `branch` without
    /// moving anything. A branch without a policy accepts every commit.
    pub fn check_promotion(
        &self,
        branch: &str,
        commit: &CommitId,
        dp_applied: bool,
        anomaly_filter_applied: Option<&str>,
    ) -> LedgerResult<PolicyVerdict> {
        self.read(|s| {
            let branch = s.branches.get_branch(branch)?;
            let commit = s.commits.get_commit(commit)?;
            let Some(policy_id) = branch.policy_id else {
                return Ok(PolicyVerdict::default());
            };
            let policy = s.policies.get_policy(&policy_id)?;
            let candidate = Candidate {
                acc_times_1e4: commit.scores.map(|sc| sc.acc_times_1e4),
                dp_applied,
                anomaly_filter_applied: anomaly_filter_applied.map(str::to_string),
            };
            Ok(PolicyCheck::evaluate(policy, &candidate))
        })?
    }

    // ---------------------------------------------------------------
    // Events and snapshots
    // ---------------------------------------------------------------

    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.notifier.subscribe(filter)
    }

    pub fn last_event_seq(&self) -> u64 {
        self.notifier.last_seq()
    }

    /// Events that could not be written to the journal.
    pub fn journal_failures(&self) -> u64 {
        self.notifier.journal_failures()
    }

    /// Read the journal back and check its hash chain.
    pub fn verify_journal(&self) -> Result<Vec<LedgerEvent>, OpenError> {
        match self.notifier.journal() {
            Some(journal) => Ok(journal.verify()?),
            None => Ok(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(LedgerSnapshot::new(
            state.clone(),
            self.clock.now(),
            self.notifier.last_seq(),
            self.notifier.last_hash(),
        ))
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        self.snapshot()?.save(path)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("last_event_seq", &self.notifier.last_seq())
            .finish()
    }
}
