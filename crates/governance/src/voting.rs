//! Voting power and vote tallies
//!
//! Voting power is a share of the DAO's whole, in basis points, made of two
//! pools that partition [`TOTAL_VOTING_POWER`]:
//!
//! * the governor pool, split evenly among the creator and governors
//!   (`governor_pool / |P|`, rounded down);
//! * the community pool, split by stake
//!   (`stake × community_pool / total_staked`, rounded down).
//!
//! Each term is the floor of a member's share of a partition of its pool, so
//! the reserved shares sum to at most `governor_pool` and the staked shares to
//! at most `community_pool`. Any single voter therefore holds at most
//! `governor_pool + community_pool = 10 000` basis points, including a sole
//! staker who is also the sole privileged member.

use portal_common::{AccountId, Amount, BasisPoints};
use serde::{Deserialize, Serialize};

use crate::dao::Dao;

/// The normalized voting power of a whole DAO
pub const TOTAL_VOTING_POWER: BasisPoints = BasisPoints::MAX;

/// A member's voting power split by pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPower {
    pub reserved: BasisPoints,
    pub staked: BasisPoints,
}

impl VotingPower {
    pub fn total(&self) -> BasisPoints {
        self.reserved.saturating_add(self.staked)
    }
}

/// The governor-pool share held by `account`
pub fn reserved_power(dao: &Dao, account: &AccountId) -> BasisPoints {
    if !dao.is_privileged(account) {
        return BasisPoints::ZERO;
    }
    // privileged_count() is at least 1: the creator is always counted
    BasisPoints::new(dao.settings.governor_pool.value() / dao.privileged_count().max(1))
}

/// The community-pool share earned by `stake` out of `total_staked`
pub fn staked_power(stake: Amount, total_staked: Amount, community_pool: BasisPoints) -> BasisPoints {
    if total_staked.is_zero() {
        return BasisPoints::ZERO;
    }
    let stake = stake.min(total_staked);
    let share = stake.value() as u128 * community_pool.value() as u128 / total_staked.value() as u128;
    // share <= community_pool, which fits
    BasisPoints::new(share as u64)
}

/// Full voting power of `account` holding `stake` in `dao`
pub fn voting_power(dao: &Dao, account: &AccountId, stake: Amount) -> VotingPower {
    VotingPower {
        reserved: reserved_power(dao, account),
        staked: staked_power(stake, dao.total_staked, dao.settings.community_pool),
    }
}

/// Members may vote if they hold a privileged role or at least the platform
/// minimum stake
pub fn can_vote(dao: &Dao, account: &AccountId, stake: Amount, min_stake: Amount) -> bool {
    dao.is_member(account) && (dao.is_privileged(account) || stake >= min_stake)
}

/// Members may propose if they hold a privileged role or at least the DAO's
/// proposal threshold in stake
pub fn can_create_proposal(dao: &Dao, account: &AccountId, stake: Amount) -> bool {
    dao.is_member(account) && (dao.is_privileged(account) || stake >= dao.settings.proposal_threshold)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

/// Running sums of vote snapshots on one proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub for_votes: BasisPoints,
    pub against_votes: BasisPoints,
    pub abstain_votes: BasisPoints,
}

/// Outcome of checking a tally against a quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub total_votes: BasisPoints,
    pub quorum_met: bool,
    pub passed: bool,
}

impl Tally {
    pub fn total(&self) -> BasisPoints {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }

    /// Add a vote's power to the sum for its choice
    pub fn record(&mut self, choice: VoteChoice, power: BasisPoints) {
        let sum = match choice {
            VoteChoice::For => &mut self.for_votes,
            VoteChoice::Against => &mut self.against_votes,
            VoteChoice::Abstain => &mut self.abstain_votes,
        };
        *sum = sum.saturating_add(power);
    }

    /// Quorum is measured against the whole DAO; a tie does not pass and
    /// abstentions count toward quorum only.
    pub fn decide(&self, quorum_threshold: BasisPoints) -> TallyResult {
        let total = self.total();
        let quorum_met = total.value() as u128 * BasisPoints::MAX.value() as u128
            >= quorum_threshold.value() as u128 * TOTAL_VOTING_POWER.value() as u128;
        TallyResult {
            total_votes: total,
            quorum_met,
            passed: quorum_met && self.for_votes > self.against_votes,
        }
    }
}
