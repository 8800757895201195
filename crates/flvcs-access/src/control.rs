use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use flvcs_events::EventPayload;
use flvcs_types::{Address, Authority, ExecutionContext, LedgerError, LedgerResult};

/// Owner plus admin set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owner: Address,
    admins: BTreeSet<Address>,
}

impl AccessControl {
    /// Start with `owner` and an empty admin set.
    pub fn new(owner: Address) -> LedgerResult<Self> {
        if owner.is_zero() {
            return Err(LedgerError::precondition("owner must not be the null address"));
        }
        Ok(Self {
            owner,
            admins: BTreeSet::new(),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_admin(&self, addr: &Address) -> bool {
        self.admins.contains(addr)
    }

    /// Current admins in address order.
    pub fn admins(&self) -> impl Iterator<Item = &Address> + '_ {
        self.admins.iter()
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    /// Fails with `NotAuthorized` unless `caller` is the owner.
    pub fn require_owner(&self, caller: &Address) -> LedgerResult<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(LedgerError::not_authorized(*caller, Authority::Owner))
        }
    }

    /// Fails with `NotAuthorized` unless `caller` is the owner or an admin.
    pub fn require_owner_or_admin(&self, caller: &Address) -> LedgerResult<()> {
        if *caller == self.owner || self.admins.contains(caller) {
            Ok(())
        } else {
            Err(LedgerError::not_authorized(*caller, Authority::OwnerOrAdmin))
        }
    }

    /// Hand ownership to `new_owner`. The previous owner keeps any admin
    /// membership it had.
    pub fn transfer_ownership(
        &mut self,
        ctx: &ExecutionContext,
        new_owner: Address,
    ) -> LedgerResult<EventPayload> {
        self.require_owner(&ctx.caller)?;
        if new_owner.is_zero() {
            return Err(LedgerError::precondition("new owner must not be the null address"));
        }

        let previous = std::mem::replace(&mut self.owner, new_owner);
        debug!(%previous, %new_owner, "ownership transferred");
        Ok(EventPayload::OwnershipTransferred {
            previous,
            new_owner,
        })
    }

    /// Add `admin` to the admin set. Granting twice is not an error.
    pub fn grant_admin(
        &mut self,
        ctx: &ExecutionContext,
        admin: Address,
    ) -> LedgerResult<EventPayload> {
        self.require_owner(&ctx.caller)?;
        let added = self.admins.insert(admin);
        debug!(%admin, added, "admin granted");
        Ok(EventPayload::AdminGranted { admin })
    }

    /// Remove `admin` from the admin set. Revoking a non-member is not an
    /// error; revoking the owner's own membership leaves owner rights intact.
    pub fn revoke_admin(
        &mut self,
        ctx: &ExecutionContext,
        admin: Address,
    ) -> LedgerResult<EventPayload> {
        self.require_owner(&ctx.caller)?;
        let removed = self.admins.remove(&admin);
        debug!(%admin, removed, "admin revoked");
        Ok(EventPayload::AdminRevoked { admin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flvcs_types::Timestamp;

    fn addr(byte: u8) -> Address {
        Address::from_raw([byte; 20])
    }

    fn as_caller(caller: Address) -> ExecutionContext {
        ExecutionContext::new(caller, Timestamp::from_secs(42))
    }

    fn acl() -> AccessControl {
        AccessControl::new(addr(1)).unwrap()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    #[test]
    fn null_owner_is_rejected() {
        let err = AccessControl::new(Address::zero()).unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn fresh_control_has_only_owner() {
        let acl = acl();
        assert_eq!(acl.owner(), addr(1));
        assert_eq!(acl.admin_count(), 0);
        assert!(acl.require_owner_or_admin(&addr(1)).is_ok());
        assert!(acl.require_owner_or_admin(&addr(2)).unwrap_err().is_not_authorized());
    }

    // ------------------------------------------------------------------
    // Admin set
    // ------------------------------------------------------------------

    #[test]
    fn granted_admin_may_write_but_not_manage_roles() {
        let mut acl = acl();
        let event = acl.grant_admin(&as_caller(addr(1)), addr(2)).unwrap();
        assert_eq!(event, EventPayload::AdminGranted { admin: addr(2) });

        assert!(acl.is_admin(&addr(2)));
        assert!(acl.require_owner_or_admin(&addr(2)).is_ok());
        assert!(acl.require_owner(&addr(2)).is_err());

        let err = acl.grant_admin(&as_caller(addr(2)), addr(3)).unwrap_err();
        assert_eq!(err, LedgerError::not_authorized(addr(2), Authority::Owner));
        assert!(!acl.is_admin(&addr(3)));
    }

    #[test]
    fn grant_and_revoke_are_idempotent() {
        let mut acl = acl();
        let owner = as_caller(addr(1));
        acl.grant_admin(&owner, addr(2)).unwrap();
        acl.grant_admin(&owner, addr(2)).unwrap();
        assert_eq!(acl.admin_count(), 1);

        acl.revoke_admin(&owner, addr(2)).unwrap();
        acl.revoke_admin(&owner, addr(2)).unwrap();
        assert_eq!(acl.admin_count(), 0);
        assert!(acl.require_owner_or_admin(&addr(2)).is_err());
    }

    #[test]
    fn owner_revoking_itself_keeps_owner_rights() {
        let mut acl = acl();
        let owner = as_caller(addr(1));
        acl.grant_admin(&owner, addr(1)).unwrap();
        acl.revoke_admin(&owner, addr(1)).unwrap();
        assert!(!acl.is_admin(&addr(1)));
        assert!(acl.require_owner_or_admin(&addr(1)).is_ok());
    }

    #[test]
    fn admins_iterate_in_order() {
        let mut acl = acl();
        let owner = as_caller(addr(1));
        acl.grant_admin(&owner, addr(9)).unwrap();
        acl.grant_admin(&owner, addr(3)).unwrap();
        let admins: Vec<_> = acl.admins().copied().collect();
        assert_eq!(admins, vec![addr(3), addr(9)]);
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    #[test]
    fn transfer_moves_owner_rights() {
        let mut acl = acl();
        let event = acl.transfer_ownership(&as_caller(addr(1)), addr(5)).unwrap();
        assert_eq!(
            event,
            EventPayload::OwnershipTransferred {
                previous: addr(1),
                new_owner: addr(5),
            }
        );
        assert_eq!(acl.owner(), addr(5));
        assert!(acl.require_owner(&addr(1)).is_err());
        assert!(acl.require_owner(&addr(5)).is_ok());
    }

    #[test]
    fn transfer_to_null_fails_without_change() {
        let mut acl = acl();
        let err = acl
            .transfer_ownership(&as_caller(addr(1)), Address::zero())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
        assert_eq!(acl.owner(), addr(1));
    }

    #[test]
    fn authorization_is_checked_before_the_null_owner() {
        let mut acl = acl();
        let err = acl
            .transfer_ownership(&as_caller(addr(7)), Address::zero())
            .unwrap_err();
        assert!(err.is_not_authorized());
    }

    #[test]
    fn serde_roundtrip() {
        let mut acl = acl();
        acl.grant_admin(&as_caller(addr(1)), addr(2)).unwrap();
        let json = serde_json::to_string(&acl).unwrap();
        let back: AccessControl = serde_json::from_str(&json).unwrap();
        assert_eq!(acl, back);
    }
}
