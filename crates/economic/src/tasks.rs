//! Task bounties
//!
//! A task's bounty is escrowed from the DAO treasury when the task is created
//! and leaves escrow exactly once: paid to the assignee after enough members
//! approve the submission, or refunded when the task is cancelled.
//!
//! ```text
//! Open ──▶ Assigned ──▶ Submitted ──▶ Completed
//!   │         │  ▲           │
//!   │         │  └───────────┘ (rejected by validators)
//!   └─────────┴──▶ Cancelled
//! ```

use std::collections::{BTreeMap, BTreeSet};

use portal_common::{AccountId, Amount, DaoId, TaskId, Timestamp};
use portal_config::PolicyConfig;
use portal_governance::Dao;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::treasury;
use crate::{EconomicError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Open,
    Assigned,
    Submitted,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub dao_id: DaoId,
    pub title: String,
    pub description: String,
    pub creator: AccountId,
    pub assignee: Option<AccountId>,
    pub bounty_amount: Amount,
    pub required_skills: BTreeSet<String>,
    pub deadline: Timestamp,
    pub required_validations: u32,
    pub state: TaskState,
    #[serde(default, with = "hex_bytes")]
    pub submission_hash: Option<Vec<u8>>,
    pub completion_proof: Option<String>,
    /// Validators of the current submission
    pub validators: BTreeSet<AccountId>,
    /// Everyone who ever validated a submission of this task
    #[serde(default)]
    pub validation_history: BTreeSet<AccountId>,
    pub validation_results: BTreeMap<AccountId, bool>,
    pub bounty_distributed: bool,
    pub created_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    pub fn approvals(&self) -> u32 {
        self.validation_results.values().filter(|approved| **approved).count() as u32
    }

    pub fn rejections(&self) -> u32 {
        self.validation_results.values().filter(|approved| !**approved).count() as u32
    }

    /// Completed with its bounty still in escrow
    pub fn bounty_pending(&self) -> bool {
        self.state == TaskState::Completed && !self.bounty_distributed
    }

    fn clear_submission(&mut self) {
        self.submission_hash = None;
        self.completion_proof = None;
        self.submitted_at = None;
        self.validators.clear();
        self.validation_results.clear();
    }
}

/// Caller-supplied fields of a new task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub creator: AccountId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub bounty_amount: Amount,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    pub deadline: Timestamp,
    pub required_validations: u32,
}

/// Result of recording one validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub task_id: TaskId,
    pub state: TaskState,
    pub approvals: u32,
    pub rejections: u32,
}

/// A released bounty; the caller credits `recipient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub task_id: TaskId,
    pub recipient: AccountId,
    pub amount: Amount,
}

/// All tasks of one DAO
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBountyEngine {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskBountyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Sum of bounties currently held in escrow
    pub fn escrowed(&self) -> u128 {
        self.tasks
            .values()
            .filter(|t| match t.state {
                TaskState::Cancelled => false,
                TaskState::Completed => !t.bounty_distributed,
                _ => true,
            })
            .map(|t| t.bounty_amount.value() as u128)
            .sum()
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(EconomicError::TaskNotFound(id))
    }

    /// Create a task and escrow its bounty from the treasury
    pub fn create(
        &mut self,
        dao: &mut Dao,
        id: TaskId,
        draft: TaskDraft,
        policy: &PolicyConfig,
        now: Timestamp,
    ) -> Result<Task> {
        dao.ensure_active()?;
        dao.ensure_member(&draft.creator)?;
        if draft.title.trim().is_empty() {
            return Err(EconomicError::InvalidInput("task title is empty".to_string()));
        }
        if draft.bounty_amount.is_zero() {
            return Err(EconomicError::InvalidAmount("bounty must be positive".to_string()));
        }
        if draft.required_validations < policy.min_required_validations {
            return Err(EconomicError::InvalidInput(format!(
                "a task needs at least {} validations",
                policy.min_required_validations
            )));
        }
        if draft.deadline <= now {
            return Err(EconomicError::InvalidInput("deadline must be in the future".to_string()));
        }
        if self.tasks.contains_key(&id) {
            return Err(EconomicError::StateConflict(format!("task {} already exists", id)));
        }
        treasury::escrow(dao, draft.bounty_amount)?;

        let task = Task {
            id,
            dao_id: dao.id,
            title: draft.title,
            description: draft.description,
            creator: draft.creator,
            assignee: None,
            bounty_amount: draft.bounty_amount,
            required_skills: draft.required_skills,
            deadline: draft.deadline,
            required_validations: draft.required_validations,
            state: TaskState::Open,
            submission_hash: None,
            completion_proof: None,
            validators: BTreeSet::new(),
            validation_history: BTreeSet::new(),
            validation_results: BTreeMap::new(),
            bounty_distributed: false,
            created_at: now,
            submitted_at: None,
            completed_at: None,
        };
        dao.task_count += 1;
        self.tasks.insert(id, task.clone());
        info!(
            "Created task {} in DAO {} with bounty {} (treasury {})",
            id, dao.id, task.bounty_amount, dao.treasury_balance
        );
        Ok(task)
    }

    /// Assign an open task. Members may claim a task for themselves; the task
    /// creator and privileged members may assign it to anyone.
    pub fn assign(
        &mut self,
        dao: &Dao,
        id: TaskId,
        caller: &AccountId,
        assignee: &AccountId,
        policy: &PolicyConfig,
    ) -> Result<Task> {
        let task = self.get_mut(id)?;
        if caller != assignee && caller != &task.creator && !dao.is_privileged(caller) {
            return Err(EconomicError::NotAuthorized(format!(
                "{} may not assign task {} to {}",
                caller, id, assignee
            )));
        }
        dao.ensure_member(assignee)?;
        if policy.forbid_creator_assignment && assignee == &task.creator {
            return Err(EconomicError::NotAuthorized(
                "a task cannot be assigned to its creator".to_string(),
            ));
        }
        match task.state {
            TaskState::Open => {}
            TaskState::Assigned => return Err(EconomicError::AlreadyAssigned(id)),
            _ => return Err(EconomicError::TaskNotOpen(id)),
        }

        task.assignee = Some(assignee.clone());
        task.state = TaskState::Assigned;
        debug!("task {} assigned to {}", id, assignee);
        Ok(task.clone())
    }

    /// Record the assignee's work submission
    pub fn submit(
        &mut self,
        id: TaskId,
        submitter: &AccountId,
        submission_hash: Vec<u8>,
        completion_proof: Option<String>,
        now: Timestamp,
    ) -> Result<Task> {
        let task = self.get_mut(id)?;
        if task.state != TaskState::Assigned {
            return Err(EconomicError::StateConflict(format!(
                "task {} is {:?}, not assigned",
                id, task.state
            )));
        }
        if task.assignee.as_ref() != Some(submitter) {
            return Err(EconomicError::NotAssignee(submitter.clone()));
        }
        if now >= task.deadline {
            return Err(EconomicError::DeadlineExpired {
                task: id,
                deadline: task.deadline,
            });
        }
        if submission_hash.is_empty() {
            return Err(EconomicError::InvalidInput("submission hash is empty".to_string()));
        }

        task.clear_submission();
        task.submission_hash = Some(submission_hash);
        task.completion_proof = completion_proof;
        task.submitted_at = Some(now);
        task.state = TaskState::Submitted;
        info!("task {} submitted by {}", id, submitter);
        Ok(task.clone())
    }

    /// Record one member's verdict on a submission
    pub fn validate(
        &mut self,
        dao: &Dao,
        id: TaskId,
        validator: &AccountId,
        approve: bool,
        policy: &PolicyConfig,
        now: Timestamp,
    ) -> Result<ValidationOutcome> {
        let task = self.get_mut(id)?;
        if task.state != TaskState::Submitted {
            return Err(EconomicError::StateConflict(format!(
                "task {} is {:?}, not submitted",
                id, task.state
            )));
        }
        dao.ensure_member(validator)?;
        if task.assignee.as_ref() == Some(validator) {
            return Err(EconomicError::NotAuthorized(
                "the assignee cannot validate their own work".to_string(),
            ));
        }
        if task.validators.contains(validator) {
            return Err(EconomicError::AlreadyValidated {
                task: id,
                validator: validator.clone(),
            });
        }

        task.validators.insert(validator.clone());
        task.validation_history.insert(validator.clone());
        task.validation_results.insert(validator.clone(), approve);
        let approvals = task.approvals();
        let rejections = task.rejections();

        if approvals >= task.required_validations {
            task.state = TaskState::Completed;
            task.completed_at = Some(now);
            info!("task {} completed with {} approvals", id, approvals);
        } else if policy.reject_on_negative_quorum && rejections >= task.required_validations {
            task.clear_submission();
            task.state = TaskState::Assigned;
            info!("task {} submission rejected; returned to assignee", id);
        }

        Ok(ValidationOutcome {
            task_id: id,
            state: task.state,
            approvals,
            rejections,
        })
    }

    /// Release the escrowed bounty of a completed task
    pub fn distribute(&mut self, dao: &Dao, id: TaskId, caller: &AccountId) -> Result<Payout> {
        let task = self.get_mut(id)?;
        dao.ensure_member(caller)?;
        if task.bounty_distributed {
            return Err(EconomicError::AlreadyDistributed(id));
        }
        if task.state != TaskState::Completed || task.approvals() < task.required_validations {
            return Err(EconomicError::StateConflict(format!(
                "task {} has not been completed",
                id
            )));
        }
        let recipient = task
            .assignee
            .clone()
            .ok_or_else(|| EconomicError::StateConflict(format!("task {} has no assignee", id)))?;

        task.bounty_distributed = true;
        info!("bounty {} of task {} released to {}", task.bounty_amount, id, recipient);
        Ok(Payout {
            task_id: id,
            recipient,
            amount: task.bounty_amount,
        })
    }

    /// Cancel a task that has not been submitted and refund its escrow
    pub fn cancel(&mut self, dao: &mut Dao, id: TaskId, caller: &AccountId) -> Result<Task> {
        let task = self.tasks.get_mut(&id).ok_or(EconomicError::TaskNotFound(id))?;
        if caller != &task.creator {
            return Err(EconomicError::NotAuthorized(
                "only the task creator may cancel it".to_string(),
            ));
        }
        if !matches!(task.state, TaskState::Open | TaskState::Assigned) {
            return Err(EconomicError::StateConflict(format!(
                "task {} is {:?} and cannot be cancelled",
                id, task.state
            )));
        }
        treasury::refund(dao, task.bounty_amount)?;
        task.state = TaskState::Cancelled;
        info!("task {} cancelled; {} returned to DAO {}", id, task.bounty_amount, dao.id);
        Ok(task.clone())
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s.trim_start_matches("0x")).map_err(de::Error::custom))
            .transpose()
    }
}
