use std::collections::BTreeMap;

use flvcs_crypto::DomainHasher;
use flvcs_types::{Address, Digest};

use crate::error::LocatorError;

/// Resolves well-known component names to deployed addresses.
///
/// Keys are name hashes, so a lookup by name and a lookup by a key computed
/// elsewhere agree. Built once at startup from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentLocator {
    entries: BTreeMap<Digest, (String, Address)>,
}

impl ComponentLocator {
    pub const COMMIT_LEDGER: &'static str = "CommitLedger";
    pub const BRANCH_MANAGER: &'static str = "BranchManager";
    pub const POLICY_REGISTRY: &'static str = "PolicyRegistry";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a name to address table, rejecting null addresses.
    pub fn from_table(table: &BTreeMap<String, Address>) -> Result<Self, LocatorError> {
        let mut locator = Self::new();
        for (name, address) in table {
            locator.register(name, *address)?;
        }
        Ok(locator)
    }

    /// Lookup key for a component name.
    pub fn key(name: &str) -> Digest {
        DomainHasher::COMPONENT.name_id(name)
    }

    /// Register or replace a component address.
    pub fn register(&mut self, name: &str, address: Address) -> Result<(), LocatorError> {
        if address.is_zero() {
            return Err(LocatorError::NullAddress(name.to_string()));
        }
        self.entries
            .insert(Self::key(name), (name.to_string(), address));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Address, LocatorError> {
        self.entries
            .get(&Self::key(name))
            .map(|(_, address)| *address)
            .ok_or_else(|| LocatorError::Missing(name.to_string()))
    }

    pub fn resolve_key(&self, key: &Digest) -> Option<Address> {
        self.entries.get(key).map(|(_, address)| *address)
    }

    /// Registered components as `(name, address)` in key order.
    pub fn components(&self) -> impl Iterator<Item = (&str, Address)> + '_ {
        self.entries
            .values()
            .map(|(name, address)| (name.as_str(), *address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name_and_key() {
        let mut locator = ComponentLocator::new();
        let addr = Address::from_raw([3; 20]);
        locator
            .register(ComponentLocator::COMMIT_LEDGER, addr)
            .unwrap();

        assert_eq!(locator.resolve("CommitLedger").unwrap(), addr);
        assert_eq!(
            locator.resolve_key(&ComponentLocator::key("CommitLedger")),
            Some(addr)
        );
        assert_eq!(locator.components().next(), Some(("CommitLedger", addr)));
    }

    #[test]
    fn missing_component_is_an_error() {
        let locator = ComponentLocator::new();
        assert_eq!(
            locator.resolve(ComponentLocator::BRANCH_MANAGER),
            Err(LocatorError::Missing("BranchManager".into()))
        );
    }

    #[test]
    fn null_address_is_rejected() {
        let mut table = BTreeMap::new();
        table.insert(ComponentLocator::POLICY_REGISTRY.to_string(), Address::zero());
        assert_eq!(
            ComponentLocator::from_table(&table),
            Err(LocatorError::NullAddress("PolicyRegistry".into()))
        );
    }

    #[test]
    fn register_replaces() {
        let mut locator = ComponentLocator::new();
        locator.register("X", Address::from_raw([1; 20])).unwrap();
        locator.register("X", Address::from_raw([2; 20])).unwrap();
        assert_eq!(locator.len(), 1);
        assert_eq!(locator.resolve("X").unwrap(), Address::from_raw([2; 20]));
    }
}
