//! Whole-user snapshot across every DAO they belong to
//!
//! Each DAO is read under its own lock, so every per-DAO entry is internally
//! consistent; entries for different DAOs may reflect different instants.

use portal_common::{AccountId, Amount, DaoId, Timestamp};
use portal_economic::Task;
use portal_governance::{Dao, DaoRole, UserProfile, Vote};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PortalResult;
use crate::platform::Platform;
use crate::projections::VotingPowerBreakdown;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoSummary {
    pub id: DaoId,
    pub name: String,
    pub description: String,
    pub invite_code: String,
    pub creator: AccountId,
    pub member_count: usize,
    pub governor_count: usize,
    pub total_staked: Amount,
    pub treasury_balance: Amount,
    pub active: bool,
    pub proposal_count: u64,
    pub task_count: u64,
    pub created_at: Timestamp,
}

impl From<&Dao> for DaoSummary {
    fn from(dao: &Dao) -> Self {
        Self {
            id: dao.id,
            name: dao.name.clone(),
            description: dao.description.clone(),
            invite_code: dao.invite_code.clone(),
            creator: dao.creator.clone(),
            member_count: dao.member_count(),
            governor_count: dao.governors().count(),
            total_staked: dao.total_staked,
            treasury_balance: dao.treasury_balance,
            active: dao.active,
            proposal_count: dao.proposal_count,
            task_count: dao.task_count,
            created_at: dao.created_at,
        }
    }
}

/// One DAO as seen by one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDaoEntry {
    pub dao: DaoSummary,
    pub role: DaoRole,
    pub stake: Amount,
    pub voting_power: VotingPowerBreakdown,
    pub active_proposals: usize,
    pub votes: Vec<Vote>,
    pub tasks_created: Vec<Task>,
    pub tasks_assigned: Vec<Task>,
    pub tasks_validated: Vec<Task>,
    /// Completed tasks assigned to the user whose bounty is still in escrow
    pub pending_bounties: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemTotals {
    pub dao_count: usize,
    pub total_staked: Amount,
    pub total_bounties_earned: Amount,
    pub pending_bounty_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEcosystem {
    pub profile: UserProfile,
    pub released_balance: Amount,
    pub daos: Vec<UserDaoEntry>,
    pub totals: EcosystemTotals,
}

fn saturating_sum(a: Amount, b: Amount) -> Amount {
    Amount::new(a.value().saturating_add(b.value()))
}

impl Platform {
    /// Everything the platform knows about `user`, per DAO and in total
    pub async fn get_complete_user_dao_ecosystem(&self, user: &AccountId) -> PortalResult<UserEcosystem> {
        let now = self.now();
        let profile = self.get_user_profile(user)?;
        let mut entries = Vec::with_capacity(profile.daos.len());
        let mut totals = EcosystemTotals {
            total_bounties_earned: profile.contribution_score,
            ..EcosystemTotals::default()
        };

        for dao_id in &profile.daos {
            let handle = match self.dao_handle(*dao_id) {
                Ok(handle) => handle,
                Err(_) => continue,
            };
            let state = handle.lock().await;
            let role = match state.dao.role_of(user) {
                Some(role) => role,
                None => continue,
            };

            let stake = state.stakes.stake_of(user);
            let mine = |t: &&Task| t.assignee.as_ref() == Some(user);
            let pending_bounties: Vec<Task> = state
                .tasks
                .tasks()
                .filter(mine)
                .filter(|t| t.bounty_pending())
                .cloned()
                .collect();

            let entry = UserDaoEntry {
                dao: DaoSummary::from(&state.dao),
                role,
                stake,
                voting_power: state.voting_power_breakdown(user, self.config.min_stake),
                active_proposals: state.proposals.active_count(now),
                votes: state.proposals.votes_by(user).cloned().collect(),
                tasks_created: state.tasks.tasks().filter(|t| &t.creator == user).cloned().collect(),
                tasks_assigned: state.tasks.tasks().filter(mine).cloned().collect(),
                tasks_validated: state
                    .tasks
                    .tasks()
                    .filter(|t| t.validation_history.contains(user))
                    .cloned()
                    .collect(),
                pending_bounties,
            };

            totals.dao_count += 1;
            totals.total_staked = saturating_sum(totals.total_staked, stake);
            for task in &entry.pending_bounties {
                totals.pending_bounty_amount = saturating_sum(totals.pending_bounty_amount, task.bounty_amount);
            }
            entries.push(entry);
        }

        debug!("ecosystem snapshot for {}: {} DAOs", user, entries.len());
        Ok(UserEcosystem {
            released_balance: self.accounts.balance(user),
            profile,
            daos: entries,
            totals,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::test_support::{account, platform};
    use crate::platform::NewTask;
    use portal_common::{Amount, ErrorKind};
    use portal_governance::{DaoRole, ProposalAction, VoteChoice};

    #[tokio::test]
    async fn test_ecosystem_snapshot() {
        let (platform, _clock) = platform();
        let first = platform.create_dao(&account("alice"), "First", "", None).await.unwrap();
        let second = platform.create_dao(&account("carol"), "Second", "", None).await.unwrap();
        platform.join_dao_by_id(&account("bob"), first.id).await.unwrap();
        platform.join_dao_by_id(&account("bob"), second.id).await.unwrap();
        platform.join_dao_by_id(&account("dave"), first.id).await.unwrap();

        platform.stake(&account("bob"), first.id, Amount::new(2_000_000)).await.unwrap();
        platform.stake(&account("bob"), second.id, Amount::new(3_000_000)).await.unwrap();

        let proposal = platform
            .create_proposal(&account("alice"), first.id, "P", "", ProposalAction::Signal, None)
            .await
            .unwrap();
        platform.vote(&account("bob"), proposal.id, VoteChoice::Against).await.unwrap();

        platform.deposit_treasury(&account("alice"), first.id, Amount::new(500)).await.unwrap();
        let task = platform
            .create_task(
                &account("alice"),
                first.id,
                NewTask {
                    title: "T".to_string(),
                    description: String::new(),
                    bounty_amount: Amount::new(500),
                    required_skills: Default::default(),
                    deadline: 100_000,
                    required_validations: 2,
                },
            )
            .await
            .unwrap();
        platform.assign_task(&account("bob"), task.id, &account("bob")).await.unwrap();
        platform.submit_task(&account("bob"), task.id, "ab", None).await.unwrap();
        platform.validate_task(&account("alice"), task.id, true).await.unwrap();
        platform.validate_task(&account("dave"), task.id, true).await.unwrap();

        let eco = platform.get_complete_user_dao_ecosystem(&account("bob")).await.unwrap();
        assert_eq!(eco.totals.dao_count, 2);
        assert_eq!(eco.totals.total_staked, Amount::new(5_000_000));
        assert_eq!(eco.totals.pending_bounty_amount, Amount::new(500));

        let entry = eco.daos.iter().find(|e| e.dao.id == first.id).unwrap();
        assert_eq!(entry.role, DaoRole::Member);
        assert_eq!(entry.votes.len(), 1);
        assert_eq!(entry.active_proposals, 1);
        assert_eq!(entry.tasks_assigned.len(), 1);
        assert_eq!(entry.pending_bounties.len(), 1);
        assert!(entry.tasks_created.is_empty());

        let alice = platform.get_complete_user_dao_ecosystem(&account("alice")).await.unwrap();
        assert_eq!(alice.daos[0].tasks_validated.len(), 1);
        assert_eq!(alice.daos[0].role, DaoRole::Creator);

        let err = platform
            .get_complete_user_dao_ecosystem(&account("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejected_round_keeps_validator_credit() {
        let (platform, _clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        for member in ["bob", "carol", "dave"] {
            platform.join_dao_by_id(&account(member), dao.id).await.unwrap();
        }
        platform.deposit_treasury(&account("alice"), dao.id, Amount::new(100)).await.unwrap();
        let task = platform
            .create_task(
                &account("alice"),
                dao.id,
                NewTask {
                    title: "T".to_string(),
                    description: String::new(),
                    bounty_amount: Amount::new(100),
                    required_skills: Default::default(),
                    deadline: 100_000,
                    required_validations: 2,
                },
            )
            .await
            .unwrap();
        platform.assign_task(&account("bob"), task.id, &account("bob")).await.unwrap();
        platform.submit_task(&account("bob"), task.id, "01", None).await.unwrap();
        platform.validate_task(&account("carol"), task.id, false).await.unwrap();
        platform.validate_task(&account("dave"), task.id, false).await.unwrap();
        assert!(platform.get_task(task.id).await.unwrap().validators.is_empty());

        for validator in ["carol", "dave"] {
            let eco = platform.get_complete_user_dao_ecosystem(&account(validator)).await.unwrap();
            assert_eq!(eco.daos[0].tasks_validated.len(), 1);
        }
    }
}
