//! Read projections
//!
//! Reads never mutate: proposals are returned settled at the current time
//! without writing the settlement back.

use portal_common::utils::normalize_invite_code;
use portal_common::{AccountId, Amount, BasisPoints, DaoId, ProposalId, TaskId};
use portal_economic::{EconomicError, Task};
use portal_governance::{voting, Dao, GovernanceError, Proposal, UserProfile, Vote, VotingPower};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};
use crate::platform::Platform;
use crate::state::DaoState;

/// A member's stake in one DAO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingInfo {
    pub dao_id: DaoId,
    pub account: AccountId,
    pub stake: Amount,
    pub total_staked: Amount,
    pub voting_power: VotingPower,
}

impl StakingInfo {
    pub(crate) fn of(state: &DaoState, account: &AccountId) -> Self {
        let stake = state.stakes.stake_of(account);
        Self {
            dao_id: state.dao.id,
            account: account.clone(),
            stake,
            total_staked: state.dao.total_staked,
            voting_power: voting::voting_power(&state.dao, account, stake),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerBreakdown {
    pub dao_id: DaoId,
    pub account: AccountId,
    pub reserved: BasisPoints,
    pub staked: BasisPoints,
    pub total: BasisPoints,
    pub stake: Amount,
    pub total_staked: Amount,
    pub is_privileged: bool,
    pub can_vote: bool,
    pub can_create_proposal: bool,
}

impl Platform {
    pub async fn get_dao_by_id(&self, dao_id: DaoId) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let state = handle.lock().await;
        Ok(state.dao.clone())
    }

    pub async fn get_dao_by_code(&self, code: &str) -> PortalResult<Dao> {
        let code = normalize_invite_code(code);
        let dao_id = self
            .invite_codes
            .get(&code)
            .map(|entry| *entry.value())
            .ok_or(PortalError::InviteCodeNotFound(code))?;
        self.get_dao_by_id(dao_id).await
    }

    pub async fn get_proposal(&self, proposal_id: ProposalId) -> PortalResult<Proposal> {
        let now = self.now();
        let handle = self.proposal_handle(proposal_id)?;
        let state = handle.lock().await;
        state
            .proposals
            .get(proposal_id)
            .map(|p| p.settled(now))
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id).into())
    }

    pub async fn get_dao_proposals(&self, dao_id: DaoId) -> PortalResult<Vec<Proposal>> {
        let now = self.now();
        let handle = self.dao_handle(dao_id)?;
        let state = handle.lock().await;
        Ok(state.proposals.proposals().map(|p| p.settled(now)).collect())
    }

    pub async fn get_proposal_votes(&self, proposal_id: ProposalId) -> PortalResult<Vec<Vote>> {
        let handle = self.proposal_handle(proposal_id)?;
        let state = handle.lock().await;
        Ok(state.proposals.votes_on(proposal_id).cloned().collect())
    }

    pub async fn get_task(&self, task_id: TaskId) -> PortalResult<Task> {
        let handle = self.task_handle(task_id)?;
        let state = handle.lock().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| EconomicError::TaskNotFound(task_id).into())
    }

    pub async fn get_dao_tasks(&self, dao_id: DaoId) -> PortalResult<Vec<Task>> {
        let handle = self.dao_handle(dao_id)?;
        let state = handle.lock().await;
        Ok(state.tasks.tasks().cloned().collect())
    }

    pub fn get_user_profile(&self, user: &AccountId) -> PortalResult<UserProfile> {
        self.profiles
            .get(user)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PortalError::ProfileNotFound(user.clone()))
    }

    pub async fn get_user_staking_info(&self, user: &AccountId, dao_id: DaoId) -> PortalResult<StakingInfo> {
        let handle = self.dao_handle(dao_id)?;
        let state = handle.lock().await;
        Ok(StakingInfo::of(&state, user))
    }

    pub async fn get_user_voting_power_breakdown(
        &self,
        user: &AccountId,
        dao_id: DaoId,
    ) -> PortalResult<VotingPowerBreakdown> {
        let handle = self.dao_handle(dao_id)?;
        let state = handle.lock().await;
        Ok(state.voting_power_breakdown(user, self.config.min_stake))
    }

    /// Funds released to `user` and not yet withdrawn
    pub fn get_account_balance(&self, user: &AccountId) -> Amount {
        self.accounts.balance(user)
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::test_support::{account, platform};
    use portal_common::{Amount, ErrorKind};
    use portal_governance::{ProposalAction, ProposalState, VoteChoice};

    #[tokio::test]
    async fn test_reads_settle_a_copy() {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        let proposal = platform
            .create_proposal(&account("alice"), dao.id, "P", "", ProposalAction::Signal, None)
            .await
            .unwrap();
        platform.vote(&account("alice"), proposal.id, VoteChoice::For).await.unwrap();

        clock.set(proposal.end_time);
        let read = platform.get_proposal(proposal.id).await.unwrap();
        assert_eq!(read.state, ProposalState::Passed);
        assert_eq!(platform.get_dao_proposals(dao.id).await.unwrap()[0].state, ProposalState::Passed);
        assert_eq!(platform.get_proposal_votes(proposal.id).await.unwrap().len(), 1);

        // the stored proposal only moves on a mutation or sweep
        assert_eq!(platform.sweep().await, 1);
        assert_eq!(platform.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_voting_power_breakdown() {
        let (platform, _clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.join_dao_by_code(&account("bob"), &dao.invite_code).await.unwrap();
        platform.stake(&account("bob"), dao.id, Amount::new(100_000_000)).await.unwrap();

        let bob = platform
            .get_user_voting_power_breakdown(&account("bob"), dao.id)
            .await
            .unwrap();
        assert_eq!(bob.staked.value(), 4_000);
        assert!(bob.can_vote);
        assert!(bob.can_create_proposal);
        assert!(!bob.is_privileged);

        let alice = platform
            .get_user_voting_power_breakdown(&account("alice"), dao.id)
            .await
            .unwrap();
        assert_eq!(alice.total.value(), 6_000);

        let by_code = platform.get_dao_by_code(&dao.invite_code).await.unwrap();
        assert_eq!(by_code.id, dao.id);
    }

    #[tokio::test]
    async fn test_missing_entities() {
        let (platform, _clock) = platform();
        assert_eq!(platform.get_dao_by_id(9.into()).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(platform.get_proposal(9.into()).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(platform.get_task(9.into()).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            platform.get_user_profile(&account("nobody")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(platform.get_account_balance(&account("nobody")).is_zero());
    }
}
