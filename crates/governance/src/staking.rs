//! Per-DAO stake positions
//!
//! The ledger and [`Dao::total_staked`] move together: every method checks
//! all preconditions and computes both new values before writing either.

use std::collections::BTreeMap;

use portal_common::{AccountId, Amount, Timestamp};
use portal_config::UnstakeLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dao::Dao;
use crate::proposals::ProposalEngine;
use crate::{GovernanceError, GovernanceResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingLedger {
    positions: BTreeMap<AccountId, Amount>,
}

impl StakingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake_of(&self, account: &AccountId) -> Amount {
        self.positions.get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&AccountId, &Amount)> {
        self.positions.iter()
    }

    /// Sum of all positions, widened so it cannot overflow
    pub fn total(&self) -> u128 {
        self.positions.values().map(|a| a.value() as u128).sum()
    }

    /// Add `amount` to the caller's position; returns the new position
    pub fn stake(
        &mut self,
        dao: &mut Dao,
        account: &AccountId,
        amount: Amount,
        min_stake: Amount,
    ) -> GovernanceResult<Amount> {
        dao.ensure_active()?;
        dao.ensure_member(account)?;
        if amount < min_stake {
            return Err(GovernanceError::InvalidAmount(format!(
                "stake of {} is below the minimum of {}",
                amount, min_stake
            )));
        }

        let position = self
            .stake_of(account)
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("stake position overflows".to_string()))?;
        let total = dao
            .total_staked
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::InvalidAmount("total stake overflows".to_string()))?;

        self.positions.insert(account.clone(), position);
        dao.total_staked = total;
        debug!("{} staked {} in DAO {} (position {})", account, amount, dao.id, position);
        Ok(position)
    }

    /// Withdraw `amount` from the caller's position; returns the new position.
    ///
    /// Under [`UnstakeLock::WhileVoting`], a member holding a vote on a
    /// proposal still open at `now` cannot unstake.
    pub fn unstake(
        &mut self,
        dao: &mut Dao,
        proposals: &ProposalEngine,
        account: &AccountId,
        amount: Amount,
        lock: UnstakeLock,
        now: Timestamp,
    ) -> GovernanceResult<Amount> {
        if amount.is_zero() {
            return Err(GovernanceError::InvalidAmount(
                "unstake amount must be positive".to_string(),
            ));
        }
        let current = self.stake_of(account);
        let position = current.checked_sub(amount).ok_or(GovernanceError::InsufficientStake {
            requested: amount,
            available: current,
        })?;
        if lock == UnstakeLock::WhileVoting && proposals.has_open_vote(account, now) {
            return Err(GovernanceError::UnstakeRestricted(format!(
                "{} has a vote on an active proposal of DAO {}",
                account, dao.id
            )));
        }
        let total = dao.total_staked.checked_sub(amount).ok_or_else(|| {
            GovernanceError::StateConflict(format!("DAO {} total stake is inconsistent", dao.id))
        })?;

        if position.is_zero() {
            self.positions.remove(account);
        } else {
            self.positions.insert(account.clone(), position);
        }
        dao.total_staked = total;
        debug!("{} unstaked {} from DAO {} (position {})", account, amount, dao.id, position);
        Ok(position)
    }
}
