//! Account and region scoped state management

use dashmap::DashMap;
use std::hash::Hash;

/// Key for account and region scoped state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRegionKey {
    pub account_id: String,
    pub region: String,
}

impl AccountRegionKey {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }
}

/// Thread-safe state store with account/region scoping
///
/// Access goes through closures so shard locks never escape the call.
pub struct StateStore<T> {
    data: DashMap<AccountRegionKey, T>,
}

impl<T> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStore<T> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Read the state for an account/region, if any has been created
    pub fn read<R>(&self, account_id: &str, region: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let key = AccountRegionKey::new(account_id, region);
        self.data.get(&key).map(|state| f(state.value()))
    }

    /// Mutate the state for an account/region, creating it on first use
    pub fn write<R>(&self, account_id: &str, region: &str, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default,
    {
        let key = AccountRegionKey::new(account_id, region);
        let mut state = self.data.entry(key).or_default();
        f(state.value_mut())
    }

    /// Mutate the state for an account/region only if it already exists
    pub fn write_existing<R>(
        &self,
        account_id: &str,
        region: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let key = AccountRegionKey::new(account_id, region);
        self.data.get_mut(&key).map(|mut state| f(state.value_mut()))
    }
}
