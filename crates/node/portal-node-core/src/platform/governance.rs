//! Staking and proposal intents

use std::sync::atomic::Ordering;

use portal_common::{AccountId, Amount, DaoId, ProposalId, TaskId};
use portal_economic::EconomicError;
use portal_governance::{
    ExecutionReceipt, FinalizeReport, GlobalRole, Proposal, ProposalAction,
    ProposalDraft, Vote, VoteChoice,
};
use tracing::info;

use super::Platform;
use crate::error::{PortalError, PortalResult};
use crate::projections::StakingInfo;

impl Platform {
    pub async fn stake(&self, caller: &AccountId, dao_id: DaoId, amount: Amount) -> PortalResult<StakingInfo> {
        let handle = self.dao_handle(dao_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        state.stakes.stake(&mut state.dao, caller, amount, self.config.min_stake)?;
        self.touch_profile(caller, self.now(), |profile| {
            profile.upgrade_role(GlobalRole::Delegate)
        });
        Ok(StakingInfo::of(state, caller))
    }

    /// Withdraw stake; the funds are credited to the caller's released balance
    pub async fn unstake(&self, caller: &AccountId, dao_id: DaoId, amount: Amount) -> PortalResult<StakingInfo> {
        let now = self.now();
        let handle = self.dao_handle(dao_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        let lock = self.config.policies.unstake_lock;
        self.accounts.credit_with(caller, amount, || {
            state
                .stakes
                .unstake(&mut state.dao, &state.proposals, caller, amount, lock, now)
                .map_err(PortalError::from)
        })?;
        Ok(StakingInfo::of(state, caller))
    }

    pub async fn create_proposal(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        title: &str,
        description: &str,
        action: ProposalAction,
        linked_task: Option<TaskId>,
    ) -> PortalResult<Proposal> {
        let now = self.now();
        let handle = self.dao_handle(dao_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        if let Some(task_id) = linked_task {
            if state.tasks.get(task_id).is_none() {
                return Err(EconomicError::TaskNotFound(task_id).into());
            }
        }

        let id = ProposalId::new(self.next_proposal_id.fetch_add(1, Ordering::SeqCst));
        let draft = ProposalDraft {
            proposer: caller.clone(),
            title: title.to_string(),
            description: description.to_string(),
            action,
            linked_task,
        };
        let proposal = state.proposals.create(&mut state.dao, &state.stakes, id, draft, now)?;
        self.proposal_index.insert(id, dao_id);
        self.touch_profile(caller, now, |profile| profile.record_participation());
        Ok(proposal)
    }

    pub async fn vote(&self, caller: &AccountId, proposal_id: ProposalId, choice: VoteChoice) -> PortalResult<Vote> {
        let now = self.now();
        let handle = self.proposal_handle(proposal_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        let vote = state.proposals.vote(
            &state.dao,
            &state.stakes,
            proposal_id,
            caller,
            choice,
            self.config.min_stake,
            now,
        )?;
        self.touch_profile(caller, now, |profile| profile.record_participation());
        Ok(vote)
    }

    /// Decide a proposal whose voting window has closed; repeatable
    pub async fn finalize_proposal(&self, proposal_id: ProposalId) -> PortalResult<FinalizeReport> {
        let now = self.now();
        let handle = self.proposal_handle(proposal_id)?;
        let mut state = handle.lock().await;
        Ok(state.proposals.finalize(proposal_id, now)?)
    }

    pub async fn execute_proposal(&self, caller: &AccountId, proposal_id: ProposalId) -> PortalResult<ExecutionReceipt> {
        let now = self.now();
        let handle = self.proposal_handle(proposal_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;

        let transfer = match state.proposals.get(proposal_id).map(|p| &p.action) {
            Some(ProposalAction::TreasuryTransfer { recipient, amount }) => Some((recipient.clone(), *amount)),
            _ => None,
        };
        let receipt = match transfer {
            Some((recipient, amount)) => {
                let receipt = self.accounts.credit_with(&recipient, amount, || {
                    state
                        .proposals
                        .execute(&mut state.dao, proposal_id, caller, now)
                        .map_err(PortalError::from)
                })?;
                info!("treasury transfer of {} to {} from DAO {}", amount, recipient, state.dao.id);
                receipt
            }
            None => state.proposals.execute(&mut state.dao, proposal_id, caller, now)?,
        };
        Ok(receipt)
    }

    pub async fn cancel_proposal(&self, caller: &AccountId, proposal_id: ProposalId) -> PortalResult<Proposal> {
        let now = self.now();
        let handle = self.proposal_handle(proposal_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        Ok(state.proposals.cancel(&state.dao, proposal_id, caller, now)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::test_support::{account, platform};
    use portal_common::{Amount, ErrorKind};
    use portal_governance::{GlobalRole, ProposalAction, ProposalState, VoteChoice};

    const MIN: Amount = Amount::new(1_000_000);

    #[tokio::test]
    async fn test_stake_and_unstake_credit_released_funds() {
        let (platform, _clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.join_dao_by_id(&account("bob"), dao.id).await.unwrap();

        let info = platform.stake(&account("bob"), dao.id, Amount::new(3_000_000)).await.unwrap();
        assert_eq!(info.stake, Amount::new(3_000_000));
        assert_eq!(info.voting_power.staked.value(), 4_000);
        assert_eq!(platform.get_user_profile(&account("bob")).unwrap().role, GlobalRole::Delegate);

        let info = platform.unstake(&account("bob"), dao.id, MIN).await.unwrap();
        assert_eq!(info.stake, Amount::new(2_000_000));
        assert_eq!(platform.get_account_balance(&account("bob")), MIN);
    }

    #[tokio::test]
    async fn test_unstake_locked_while_voting() {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.join_dao_by_id(&account("bob"), dao.id).await.unwrap();
        platform.stake(&account("bob"), dao.id, MIN).await.unwrap();
        let proposal = platform
            .create_proposal(&account("alice"), dao.id, "P", "", ProposalAction::Signal, None)
            .await
            .unwrap();
        platform.vote(&account("bob"), proposal.id, VoteChoice::For).await.unwrap();

        let err = platform.unstake(&account("bob"), dao.id, MIN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnstakeRestricted);

        clock.set(proposal.end_time);
        platform.unstake(&account("bob"), dao.id, MIN).await.unwrap();
    }

    #[tokio::test]
    async fn test_linked_task_must_exist() {
        let (platform, _clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        let err = platform
            .create_proposal(&account("alice"), dao.id, "P", "", ProposalAction::Signal, Some(42.into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_treasury_transfer_credits_recipient() {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.deposit_treasury(&account("funder"), dao.id, Amount::new(500)).await.unwrap();
        let proposal = platform
            .create_proposal(
                &account("alice"),
                dao.id,
                "Pay carol",
                "",
                ProposalAction::TreasuryTransfer {
                    recipient: account("carol"),
                    amount: Amount::new(200),
                },
                None,
            )
            .await
            .unwrap();
        platform.vote(&account("alice"), proposal.id, VoteChoice::For).await.unwrap();

        clock.set(proposal.execution_time);
        platform.execute_proposal(&account("alice"), proposal.id).await.unwrap();
        assert_eq!(platform.get_account_balance(&account("carol")), Amount::new(200));
        assert_eq!(platform.get_dao_by_id(dao.id).await.unwrap().treasury_balance, Amount::new(300));
        assert_eq!(
            platform.get_proposal(proposal.id).await.unwrap().state,
            ProposalState::Executed
        );
    }

    #[tokio::test]
    async fn test_uncreditable_transfer_leaves_proposal_passed() {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.deposit_treasury(&account("funder"), dao.id, Amount::new(500)).await.unwrap();
        let proposal = platform
            .create_proposal(
                &account("alice"),
                dao.id,
                "Pay carol",
                "",
                ProposalAction::TreasuryTransfer {
                    recipient: account("carol"),
                    amount: Amount::new(200),
                },
                None,
            )
            .await
            .unwrap();
        platform.vote(&account("alice"), proposal.id, VoteChoice::For).await.unwrap();
        platform.accounts.credit(&account("carol"), Amount::new(u64::MAX - 100)).unwrap();

        clock.set(proposal.execution_time);
        let err = platform.execute_proposal(&account("alice"), proposal.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(
            platform.get_proposal(proposal.id).await.unwrap().state,
            ProposalState::Passed
        );
        assert_eq!(platform.get_dao_by_id(dao.id).await.unwrap().treasury_balance, Amount::new(500));
        assert_eq!(platform.get_account_balance(&account("carol")), Amount::new(u64::MAX - 100));
    }
}
