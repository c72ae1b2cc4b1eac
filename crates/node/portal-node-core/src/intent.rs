//! Serializable intents
//!
//! Every mutating operation of the platform has a matching [`Intent`], so
//! authenticated requests can arrive as JSON from any transport and be
//! dispatched through [`Platform::apply`].

use std::collections::BTreeSet;

use portal_common::{AccountId, Amount, DaoId, ProposalId, TaskId, Timestamp};
use portal_economic::{Payout, Task, ValidationOutcome};
use portal_governance::{
    Dao, DaoSettings, ExecutionReceipt, FinalizeReport, Proposal, ProposalAction, UserProfile, Vote,
    VoteChoice,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PortalResult;
use crate::platform::{NewTask, Platform};
use crate::projections::StakingInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    CreateDao {
        caller: AccountId,
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        settings: Option<DaoSettings>,
    },
    JoinDaoByCode {
        caller: AccountId,
        invite_code: String,
    },
    JoinDaoById {
        caller: AccountId,
        dao_id: DaoId,
    },
    PromoteToGovernor {
        caller: AccountId,
        dao_id: DaoId,
        target: AccountId,
    },
    DemoteGovernor {
        caller: AccountId,
        dao_id: DaoId,
        target: AccountId,
    },
    TransferDaoOwnership {
        caller: AccountId,
        dao_id: DaoId,
        new_owner: AccountId,
    },
    RemoveMember {
        caller: AccountId,
        dao_id: DaoId,
        target: AccountId,
    },
    SetDaoActive {
        caller: AccountId,
        dao_id: DaoId,
        active: bool,
    },
    /// Reported by the payment collaborator; `caller` must be a premium operator
    GrantPremium {
        caller: AccountId,
        user: AccountId,
        until: Timestamp,
    },
    Stake {
        caller: AccountId,
        dao_id: DaoId,
        amount: Amount,
    },
    Unstake {
        caller: AccountId,
        dao_id: DaoId,
        amount: Amount,
    },
    CreateProposal {
        caller: AccountId,
        dao_id: DaoId,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        action: ProposalAction,
        #[serde(default)]
        linked_task: Option<TaskId>,
    },
    Vote {
        caller: AccountId,
        proposal_id: ProposalId,
        choice: VoteChoice,
    },
    FinalizeProposal {
        proposal_id: ProposalId,
    },
    ExecuteProposal {
        caller: AccountId,
        proposal_id: ProposalId,
    },
    CancelProposal {
        caller: AccountId,
        proposal_id: ProposalId,
    },
    DepositTreasury {
        caller: AccountId,
        dao_id: DaoId,
        amount: Amount,
    },
    CreateTask {
        caller: AccountId,
        dao_id: DaoId,
        title: String,
        #[serde(default)]
        description: String,
        bounty_amount: Amount,
        #[serde(default)]
        required_skills: BTreeSet<String>,
        deadline: Timestamp,
        required_validations: u32,
    },
    AssignTask {
        caller: AccountId,
        task_id: TaskId,
        assignee: AccountId,
    },
    SubmitTask {
        caller: AccountId,
        task_id: TaskId,
        /// Hex encoded, optionally `0x` prefixed
        submission_hash: String,
        #[serde(default)]
        completion_proof: Option<String>,
    },
    ValidateTask {
        caller: AccountId,
        task_id: TaskId,
        approve: bool,
    },
    DistributeBounty {
        caller: AccountId,
        task_id: TaskId,
    },
    CancelTask {
        caller: AccountId,
        task_id: TaskId,
    },
}

impl Intent {
    /// Wire name of the intent, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Intent::CreateDao { .. } => "create_dao",
            Intent::JoinDaoByCode { .. } => "join_dao_by_code",
            Intent::JoinDaoById { .. } => "join_dao_by_id",
            Intent::PromoteToGovernor { .. } => "promote_to_governor",
            Intent::DemoteGovernor { .. } => "demote_governor",
            Intent::TransferDaoOwnership { .. } => "transfer_dao_ownership",
            Intent::RemoveMember { .. } => "remove_member",
            Intent::SetDaoActive { .. } => "set_dao_active",
            Intent::GrantPremium { .. } => "grant_premium",
            Intent::Stake { .. } => "stake",
            Intent::Unstake { .. } => "unstake",
            Intent::CreateProposal { .. } => "create_proposal",
            Intent::Vote { .. } => "vote",
            Intent::FinalizeProposal { .. } => "finalize_proposal",
            Intent::ExecuteProposal { .. } => "execute_proposal",
            Intent::CancelProposal { .. } => "cancel_proposal",
            Intent::DepositTreasury { .. } => "deposit_treasury",
            Intent::CreateTask { .. } => "create_task",
            Intent::AssignTask { .. } => "assign_task",
            Intent::SubmitTask { .. } => "submit_task",
            Intent::ValidateTask { .. } => "validate_task",
            Intent::DistributeBounty { .. } => "distribute_bounty",
            Intent::CancelTask { .. } => "cancel_task",
        }
    }
}

/// Result of an applied intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Dao(Dao),
    Profile(UserProfile),
    Staking(StakingInfo),
    Proposal(Proposal),
    Vote(Vote),
    Finalized(FinalizeReport),
    Executed(ExecutionReceipt),
    Task(Task),
    Validation(ValidationOutcome),
    Payout(Payout),
}

impl Platform {
    /// Dispatch one intent to the operation it names
    pub async fn apply(&self, intent: Intent) -> PortalResult<Outcome> {
        let name = intent.name();
        debug!("applying {}", name);
        let result = self.dispatch(intent).await;
        if let Err(e) = &result {
            warn!("{} rejected ({:?}): {}", name, e.kind(), e);
        }
        result
    }

    async fn dispatch(&self, intent: Intent) -> PortalResult<Outcome> {
        let outcome = match intent {
            Intent::CreateDao {
                caller,
                name,
                description,
                settings,
            } => Outcome::Dao(self.create_dao(&caller, &name, &description, settings).await?),
            Intent::JoinDaoByCode { caller, invite_code } => {
                Outcome::Dao(self.join_dao_by_code(&caller, &invite_code).await?)
            }
            Intent::JoinDaoById { caller, dao_id } => Outcome::Dao(self.join_dao_by_id(&caller, dao_id).await?),
            Intent::PromoteToGovernor { caller, dao_id, target } => {
                Outcome::Dao(self.promote_to_governor(&caller, dao_id, &target).await?)
            }
            Intent::DemoteGovernor { caller, dao_id, target } => {
                Outcome::Dao(self.demote_governor(&caller, dao_id, &target).await?)
            }
            Intent::TransferDaoOwnership {
                caller,
                dao_id,
                new_owner,
            } => Outcome::Dao(self.transfer_dao_ownership(&caller, dao_id, &new_owner).await?),
            Intent::RemoveMember { caller, dao_id, target } => {
                Outcome::Dao(self.remove_member(&caller, dao_id, &target).await?)
            }
            Intent::SetDaoActive { caller, dao_id, active } => {
                Outcome::Dao(self.set_dao_active(&caller, dao_id, active).await?)
            }
            Intent::GrantPremium { caller, user, until } => {
                Outcome::Profile(self.grant_premium(&caller, &user, until).await?)
            }
            Intent::Stake { caller, dao_id, amount } => Outcome::Staking(self.stake(&caller, dao_id, amount).await?),
            Intent::Unstake { caller, dao_id, amount } => {
                Outcome::Staking(self.unstake(&caller, dao_id, amount).await?)
            }
            Intent::CreateProposal {
                caller,
                dao_id,
                title,
                description,
                action,
                linked_task,
            } => Outcome::Proposal(
                self.create_proposal(&caller, dao_id, &title, &description, action, linked_task)
                    .await?,
            ),
            Intent::Vote {
                caller,
                proposal_id,
                choice,
            } => Outcome::Vote(self.vote(&caller, proposal_id, choice).await?),
            Intent::FinalizeProposal { proposal_id } => Outcome::Finalized(self.finalize_proposal(proposal_id).await?),
            Intent::ExecuteProposal { caller, proposal_id } => {
                Outcome::Executed(self.execute_proposal(&caller, proposal_id).await?)
            }
            Intent::CancelProposal { caller, proposal_id } => {
                Outcome::Proposal(self.cancel_proposal(&caller, proposal_id).await?)
            }
            Intent::DepositTreasury { caller, dao_id, amount } => {
                Outcome::Dao(self.deposit_treasury(&caller, dao_id, amount).await?)
            }
            Intent::CreateTask {
                caller,
                dao_id,
                title,
                description,
                bounty_amount,
                required_skills,
                deadline,
                required_validations,
            } => {
                let task = NewTask {
                    title,
                    description,
                    bounty_amount,
                    required_skills,
                    deadline,
                    required_validations,
                };
                Outcome::Task(self.create_task(&caller, dao_id, task).await?)
            }
            Intent::AssignTask {
                caller,
                task_id,
                assignee,
            } => Outcome::Task(self.assign_task(&caller, task_id, &assignee).await?),
            Intent::SubmitTask {
                caller,
                task_id,
                submission_hash,
                completion_proof,
            } => Outcome::Task(
                self.submit_task(&caller, task_id, &submission_hash, completion_proof)
                    .await?,
            ),
            Intent::ValidateTask {
                caller,
                task_id,
                approve,
            } => Outcome::Validation(self.validate_task(&caller, task_id, approve).await?),
            Intent::DistributeBounty { caller, task_id } => {
                Outcome::Payout(self.distribute_bounty(&caller, task_id).await?)
            }
            Intent::CancelTask { caller, task_id } => Outcome::Task(self.cancel_task(&caller, task_id).await?),
        };
        Ok(outcome)
    }
}
