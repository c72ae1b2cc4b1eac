//! Per-DAO state

use portal_common::{AccountId, Amount, Timestamp};
use portal_economic::TaskBountyEngine;
use portal_governance::{voting, Dao, ProposalEngine, StakingLedger};
use serde::{Deserialize, Serialize};

use crate::projections::VotingPowerBreakdown;

/// Everything mutable that belongs to one DAO.
///
/// The platform keeps each `DaoState` behind its own lock, so an intent sees
/// and updates the DAO, its stake positions, proposals and tasks together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoState {
    pub dao: Dao,
    pub stakes: StakingLedger,
    pub proposals: ProposalEngine,
    pub tasks: TaskBountyEngine,
}

impl DaoState {
    pub fn new(dao: Dao) -> Self {
        Self {
            dao,
            stakes: StakingLedger::new(),
            proposals: ProposalEngine::new(),
            tasks: TaskBountyEngine::new(),
        }
    }

    pub fn voting_power_breakdown(&self, account: &AccountId, min_stake: Amount) -> VotingPowerBreakdown {
        let stake = self.stakes.stake_of(account);
        let power = voting::voting_power(&self.dao, account, stake);
        VotingPowerBreakdown {
            dao_id: self.dao.id,
            account: account.clone(),
            reserved: power.reserved,
            staked: power.staked,
            total: power.total(),
            stake,
            total_staked: self.dao.total_staked,
            is_privileged: self.dao.is_privileged(account),
            can_vote: voting::can_vote(&self.dao, account, stake, min_stake),
            can_create_proposal: voting::can_create_proposal(&self.dao, account, stake),
        }
    }

    /// Settle every proposal; returns how many changed state
    pub fn settle(&mut self, now: Timestamp) -> usize {
        self.proposals.settle_all(now)
    }
}
