//! Treasury and task bounty intents

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;

use portal_common::{AccountId, Amount, DaoId, TaskId, Timestamp};
use portal_economic::{Payout, Task, TaskDraft, ValidationOutcome};
use portal_governance::Dao;
use tracing::info;

use super::Platform;
use crate::error::{PortalError, PortalResult};

/// Fields of a `create_task` intent
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub bounty_amount: Amount,
    pub required_skills: BTreeSet<String>,
    pub deadline: Timestamp,
    pub required_validations: u32,
}

impl Platform {
    /// Credit funds received from an external wallet to a DAO treasury
    pub async fn deposit_treasury(&self, caller: &AccountId, dao_id: DaoId, amount: Amount) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        portal_economic::deposit_treasury(&mut state.dao, amount)?;
        info!("{} deposited {} into DAO {}", caller, amount, dao_id);
        Ok(state.dao.clone())
    }

    pub async fn create_task(&self, caller: &AccountId, dao_id: DaoId, task: NewTask) -> PortalResult<Task> {
        let now = self.now();
        let handle = self.dao_handle(dao_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;

        let id = TaskId::new(self.next_task_id.fetch_add(1, Ordering::SeqCst));
        let draft = TaskDraft {
            creator: caller.clone(),
            title: task.title,
            description: task.description,
            bounty_amount: task.bounty_amount,
            required_skills: task.required_skills,
            deadline: task.deadline,
            required_validations: task.required_validations,
        };
        let task = state.tasks.create(&mut state.dao, id, draft, &self.config.policies, now)?;
        self.task_index.insert(id, dao_id);
        Ok(task)
    }

    pub async fn assign_task(&self, caller: &AccountId, task_id: TaskId, assignee: &AccountId) -> PortalResult<Task> {
        let handle = self.task_handle(task_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        Ok(state
            .tasks
            .assign(&state.dao, task_id, caller, assignee, &self.config.policies)?)
    }

    /// Submit work; `submission_hash` is hex encoded
    pub async fn submit_task(
        &self,
        caller: &AccountId,
        task_id: TaskId,
        submission_hash: &str,
        completion_proof: Option<String>,
    ) -> PortalResult<Task> {
        let hash = hex::decode(submission_hash.trim_start_matches("0x"))
            .map_err(|e| PortalError::InvalidInput(format!("submission hash is not hex: {}", e)))?;
        let now = self.now();
        let handle = self.task_handle(task_id)?;
        let mut state = handle.lock().await;
        Ok(state.tasks.submit(task_id, caller, hash, completion_proof, now)?)
    }

    pub async fn validate_task(&self, caller: &AccountId, task_id: TaskId, approve: bool) -> PortalResult<ValidationOutcome> {
        let now = self.now();
        let handle = self.task_handle(task_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        Ok(state
            .tasks
            .validate(&state.dao, task_id, caller, approve, &self.config.policies, now)?)
    }

    /// Release a completed task's bounty to its assignee
    pub async fn distribute_bounty(&self, caller: &AccountId, task_id: TaskId) -> PortalResult<Payout> {
        let now = self.now();
        let handle = self.task_handle(task_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;

        let pending = state
            .tasks
            .get(task_id)
            .and_then(|task| task.assignee.clone().map(|assignee| (assignee, task.bounty_amount)));
        let payout = match pending {
            Some((assignee, amount)) => self.accounts.credit_with(&assignee, amount, || {
                state.tasks.distribute(&state.dao, task_id, caller).map_err(PortalError::from)
            })?,
            None => state.tasks.distribute(&state.dao, task_id, caller)?,
        };
        self.touch_profile(&payout.recipient, now, |profile| profile.record_bounty(payout.amount));
        Ok(payout)
    }

    pub async fn cancel_task(&self, caller: &AccountId, task_id: TaskId) -> PortalResult<Task> {
        let handle = self.task_handle(task_id)?;
        let mut guard = handle.lock().await;
        let state = &mut *guard;
        Ok(state.tasks.cancel(&mut state.dao, task_id, caller)?)
    }
}
