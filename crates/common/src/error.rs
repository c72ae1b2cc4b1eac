//! Error types shared across the Portal crates

use std::fmt;
use std::result;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type
pub type Result<T> = result::Result<T, Error>;

/// The failure taxonomy every engine error maps onto.
///
/// Callers branch on the kind (for example to tell "already voted" apart from
/// "voting closed"); the message carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required role or membership
    NotAuthorized,
    /// DAO, proposal, task or user absent
    NotFound,
    /// Stake or bounty below minimum, non-positive, or out of range
    InvalidAmount,
    /// Malformed input that is not an amount
    InvalidInput,
    InsufficientStake,
    InsufficientTreasury,
    InsufficientVotingPower,
    AlreadyVoted,
    AlreadyAssigned,
    AlreadyDistributed,
    AlreadyValidated,
    AlreadyMember,
    /// Operation invalid for the entity's current lifecycle state
    StateConflict,
    DeadlineExpired,
    VotingClosed,
    ExecutionDelayNotElapsed,
    NotPassed,
    UnstakeRestricted,
    DaoInactive,
    Storage,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name, as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InsufficientStake => "insufficient_stake",
            ErrorKind::InsufficientTreasury => "insufficient_treasury",
            ErrorKind::InsufficientVotingPower => "insufficient_voting_power",
            ErrorKind::AlreadyVoted => "already_voted",
            ErrorKind::AlreadyAssigned => "already_assigned",
            ErrorKind::AlreadyDistributed => "already_distributed",
            ErrorKind::AlreadyValidated => "already_validated",
            ErrorKind::AlreadyMember => "already_member",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::DeadlineExpired => "deadline_expired",
            ErrorKind::VotingClosed => "voting_closed",
            ErrorKind::ExecutionDelayNotElapsed => "execution_delay_not_elapsed",
            ErrorKind::NotPassed => "not_passed",
            ErrorKind::UnstakeRestricted => "unstake_restricted",
            ErrorKind::DaoInactive => "dao_inactive",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common error type for utilities in this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::InvalidInput,
            Error::Internal(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }
}
