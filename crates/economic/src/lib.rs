//! Portal economic system
//!
//! Treasury escrow and task bounties for DAOs, plus the book of funds
//! released to accounts (unstaked capital, executed treasury transfers and
//! distributed bounties).

use portal_common::{AccountId, Amount, ErrorKind, TaskId, Timestamp};
use portal_governance::GovernanceError;

pub mod accounts;
pub mod tasks;
pub mod treasury;

pub use accounts::AccountBook;
pub use tasks::{Payout, Task, TaskBountyEngine, TaskDraft, TaskState, ValidationOutcome};
pub use treasury::deposit_treasury;

/// Economic error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EconomicError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Permission denied: {0}")]
    NotAuthorized(String),

    #[error("{0} is not the assignee of this task")]
    NotAssignee(AccountId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient treasury: requested {requested}, available {available}")]
    InsufficientTreasury { requested: Amount, available: Amount },

    #[error("Task {0} is already assigned")]
    AlreadyAssigned(TaskId),

    #[error("Task {0} is not open")]
    TaskNotOpen(TaskId),

    #[error("{validator} already validated task {task}")]
    AlreadyValidated { task: TaskId, validator: AccountId },

    #[error("Bounty of task {0} was already distributed")]
    AlreadyDistributed(TaskId),

    #[error("Task {task} deadline {deadline} has passed")]
    DeadlineExpired { task: TaskId, deadline: Timestamp },

    #[error("Invalid state: {0}")]
    StateConflict(String),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

impl EconomicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EconomicError::TaskNotFound(_) => ErrorKind::NotFound,
            EconomicError::NotAuthorized(_) | EconomicError::NotAssignee(_) => {
                ErrorKind::NotAuthorized
            }
            EconomicError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            EconomicError::InvalidInput(_) => ErrorKind::InvalidInput,
            EconomicError::InsufficientTreasury { .. } => ErrorKind::InsufficientTreasury,
            EconomicError::AlreadyAssigned(_) => ErrorKind::AlreadyAssigned,
            EconomicError::TaskNotOpen(_) | EconomicError::StateConflict(_) => {
                ErrorKind::StateConflict
            }
            EconomicError::AlreadyValidated { .. } => ErrorKind::AlreadyValidated,
            EconomicError::AlreadyDistributed(_) => ErrorKind::AlreadyDistributed,
            EconomicError::DeadlineExpired { .. } => ErrorKind::DeadlineExpired,
            EconomicError::Governance(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EconomicError>;
