//! Released-funds balances
//!
//! Funds leaving a DAO (unstaked capital, treasury transfers, bounties) are
//! credited here. Withdrawal to an external wallet happens outside the engine.

use std::collections::BTreeMap;

use dashmap::DashMap;
use portal_common::{AccountId, Amount};
use tracing::debug;

use crate::{EconomicError, Result};

#[derive(Debug, Default)]
pub struct AccountBook {
    balances: DashMap<AccountId, Amount>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot
    pub fn from_snapshot(snapshot: BTreeMap<AccountId, Amount>) -> Self {
        Self {
            balances: snapshot.into_iter().collect(),
        }
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances
            .get(account)
            .map(|entry| *entry.value())
            .unwrap_or(Amount::ZERO)
    }

    /// Credit `amount`; returns the new balance
    pub fn credit(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        let mut entry = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
        let balance = entry
            .checked_add(amount)
            .ok_or_else(|| EconomicError::InvalidAmount(format!("balance of {} overflows", account)))?;
        *entry = balance;
        debug!("credited {} to {} (balance {})", amount, account, balance);
        Ok(balance)
    }

    /// Credit `amount` only if `commit` succeeds.
    ///
    /// The balance entry stays locked while `commit` runs, so once `commit`
    /// has changed state the credit cannot fail. `commit` must not touch
    /// this book.
    pub fn credit_with<T, E, F>(&self, account: &AccountId, amount: Amount, commit: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<EconomicError>,
    {
        let mut entry = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
        let balance = entry
            .checked_add(amount)
            .ok_or_else(|| EconomicError::InvalidAmount(format!("balance of {} overflows", account)))?;
        let value = commit()?;
        *entry = balance;
        debug!("credited {} to {} (balance {})", amount, account, balance);
        Ok(value)
    }

    /// A sorted copy of every balance
    pub fn snapshot(&self) -> BTreeMap<AccountId, Amount> {
        self.balances
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
