use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use flvcs_access::AccessControl;
use flvcs_crypto::DomainHasher;
use flvcs_events::EventPayload;
use flvcs_types::{Entity, ExecutionContext, LedgerError, LedgerResult, PolicyId};

/// Acceptance criteria for a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    /// Minimum accuracy scaled by 10^4 (`9_000` = 90%). Zero disables the check.
    pub min_accuracy: u32,
    /// Whether updates must be trained with differential privacy.
    pub dp_required: bool,
    /// Descriptor of the anomaly filter updates must pass; empty for none.
    pub anomaly_filter: String,
}

/// Policies keyed by the hash of their name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRegistry {
    policies: BTreeMap<PolicyId, Policy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic id for a policy name.
    pub fn policy_id(name: &str) -> PolicyId {
        DomainHasher::POLICY.name_id(name)
    }

    /// Create or replace the policy called `name`.
    ///
    /// Values are stored as given; there is no range validation.
    pub fn upsert_policy(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        name: &str,
        min_accuracy: u32,
        dp_required: bool,
        anomaly_filter: &str,
    ) -> LedgerResult<(PolicyId, EventPayload)> {
        acl.require_owner_or_admin(&ctx.caller)?;

        let id = Self::policy_id(name);
        let replaced = self
            .policies
            .insert(
                id,
                Policy {
                    name: name.to_string(),
                    min_accuracy,
                    dp_required,
                    anomaly_filter: anomaly_filter.to_string(),
                },
            )
            .is_some();

        debug!(%id, name, min_accuracy, dp_required, replaced, "policy upserted");
        Ok((
            id,
            EventPayload::PolicyUpserted {
                id,
                name: name.to_string(),
                min_accuracy,
                dp_required,
                anomaly_filter: anomaly_filter.to_string(),
            },
        ))
    }

    /// Delete a policy. Branches that reference it keep the dangling id.
    pub fn remove_policy(
        &mut self,
        ctx: &ExecutionContext,
        acl: &AccessControl,
        id: &PolicyId,
    ) -> LedgerResult<EventPayload> {
        acl.require_owner_or_admin(&ctx.caller)?;

        let removed = self
            .policies
            .remove(id)
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Policy, id))?;

        debug!(%id, name = %removed.name, "policy removed");
        Ok(EventPayload::PolicyRemoved { id: *id })
    }

    pub fn get_policy(&self, id: &PolicyId) -> LedgerResult<&Policy> {
        self.policies
            .get(id)
            .ok_or_else(|| LedgerError::does_not_exist(Entity::Policy, id))
    }

    pub fn contains(&self, id: &PolicyId) -> bool {
        self.policies.contains_key(id)
    }

    /// All policies in id order.
    pub fn policies(&self) -> impl Iterator<Item = (&PolicyId, &Policy)> + '_ {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flvcs_types::{Address, Timestamp};

    fn owner() -> Address {
        Address::from_raw([1; 20])
    }

    fn ctx(caller: Address) -> ExecutionContext {
        ExecutionContext::new(caller, Timestamp::from_secs(10))
    }

    fn setup() -> (AccessControl, PolicyRegistry) {
        (AccessControl::new(owner()).unwrap(), PolicyRegistry::new())
    }

    #[test]
    fn upsert_then_get() {
        let (acl, mut reg) = setup();
        let (id, event) = reg
            .upsert_policy(&ctx(owner()), &acl, "strict", 9_000, true, "krum")
            .unwrap();

        assert_eq!(id, PolicyRegistry::policy_id("strict"));
        assert!(matches!(
            event,
            EventPayload::PolicyUpserted { min_accuracy: 9_000, dp_required: true, .. }
        ));

        let policy = reg.get_policy(&id).unwrap();
        assert_eq!(policy.name, "strict");
        assert_eq!(policy.anomaly_filter, "krum");
        assert!(reg.contains(&id));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let (acl, mut reg) = setup();
        let (first, _) = reg
            .upsert_policy(&ctx(owner()), &acl, "p", 1, false, "")
            .unwrap();
        let (second, _) = reg
            .upsert_policy(&ctx(owner()), &acl, "p", 2, true, "median")
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
        let policy = reg.get_policy(&first).unwrap();
        assert_eq!(policy.min_accuracy, 2);
        assert!(policy.dp_required);
    }

    #[test]
    fn out_of_range_accuracy_is_accepted() {
        let (acl, mut reg) = setup();
        let (id, _) = reg
            .upsert_policy(&ctx(owner()), &acl, "odd", u32::MAX, false, "")
            .unwrap();
        assert_eq!(reg.get_policy(&id).unwrap().min_accuracy, u32::MAX);
    }

    #[test]
    fn remove_then_lookup_fails() {
        let (acl, mut reg) = setup();
        let (id, _) = reg
            .upsert_policy(&ctx(owner()), &acl, "p", 0, false, "")
            .unwrap();

        let event = reg.remove_policy(&ctx(owner()), &acl, &id).unwrap();
        assert_eq!(event, EventPayload::PolicyRemoved { id });
        assert!(reg.get_policy(&id).unwrap_err().is_does_not_exist());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_unknown_fails() {
        let (acl, mut reg) = setup();
        let err = reg
            .remove_policy(&ctx(owner()), &acl, &PolicyRegistry::policy_id("ghost"))
            .unwrap_err();
        assert!(err.is_does_not_exist());
    }

    #[test]
    fn writes_require_a_role() {
        let (acl, mut reg) = setup();
        let stranger = ctx(Address::from_raw([9; 20]));

        let err = reg
            .upsert_policy(&stranger, &acl, "p", 0, false, "")
            .unwrap_err();
        assert!(err.is_not_authorized());
        assert!(reg.is_empty());

        // Authorization is checked before existence.
        let err = reg
            .remove_policy(&stranger, &acl, &PolicyRegistry::policy_id("p"))
            .unwrap_err();
        assert!(err.is_not_authorized());
    }

    #[test]
    fn policies_iterate_by_id() {
        let (acl, mut reg) = setup();
        for name in ["c", "a", "b"] {
            reg.upsert_policy(&ctx(owner()), &acl, name, 0, false, "")
                .unwrap();
        }
        let ids: Vec<_> = reg.policies().map(|(id, _)| *id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
