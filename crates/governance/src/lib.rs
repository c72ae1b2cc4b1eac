//! Governance for Portal DAOs
//!
//! This crate holds the transition rules for everything a DAO votes with:
//! membership and roles ([`dao`], [`profile`]), staked capital ([`staking`]),
//! the voting-power calculation ([`voting`]) and the proposal lifecycle
//! ([`proposals`], [`execution`]).
//!
//! Every operation here is synchronous and works on plain values owned by the
//! caller. Isolation between concurrent intents is the caller's job; the
//! node crate holds each DAO's state behind a single lock.

use portal_common::{AccountId, Amount, DaoId, ErrorKind, ProposalId, Timestamp};
use thiserror::Error;

pub mod dao;
pub mod execution;
pub mod profile;
pub mod proposals;
pub mod staking;
pub mod voting;

pub use dao::{Dao, DaoRole, DaoSettings};
pub use execution::{ExecutionEffect, ExecutionReceipt};
pub use profile::{GlobalRole, UserProfile};
pub use proposals::{
    FinalizeReport, OutcomeReason, Proposal, ProposalAction, ProposalDraft, ProposalEngine,
    ProposalState, Vote,
};
pub use staking::StakingLedger;
pub use voting::{Tally, TallyResult, VoteChoice, VotingPower, TOTAL_VOTING_POWER};

/// Error types for governance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("DAO not found: {0}")]
    DaoNotFound(DaoId),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("DAO {0} is inactive")]
    DaoInactive(DaoId),

    #[error("Permission denied: {0}")]
    NotAuthorized(String),

    #[error("{account} is not a member of DAO {dao}")]
    NotMember { dao: DaoId, account: AccountId },

    #[error("{account} is already a member of DAO {dao}")]
    AlreadyMember { dao: DaoId, account: AccountId },

    #[error("{0} is already a governor")]
    AlreadyGovernor(AccountId),

    #[error("{0} is not a governor")]
    NotGovernor(AccountId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stake: requested {requested}, staked {available}")]
    InsufficientStake { requested: Amount, available: Amount },

    #[error("Insufficient treasury: requested {requested}, available {available}")]
    InsufficientTreasury { requested: Amount, available: Amount },

    #[error("Unstake restricted: {0}")]
    UnstakeRestricted(String),

    #[error("Insufficient voting power: {0}")]
    InsufficientVotingPower(String),

    #[error("{voter} already voted on proposal {proposal}")]
    AlreadyVoted { proposal: ProposalId, voter: AccountId },

    #[error("Voting on proposal {0} is closed")]
    VotingClosed(ProposalId),

    #[error("Voting on proposal {0} is still open")]
    VotingOpen(ProposalId),

    #[error("Proposal {0} has not passed")]
    NotPassed(ProposalId),

    #[error("Proposal {proposal} cannot be executed before {execution_time}")]
    ExecutionDelayNotElapsed { proposal: ProposalId, execution_time: Timestamp },

    #[error("Invalid state: {0}")]
    StateConflict(String),
}

impl GovernanceError {
    /// The taxonomy kind callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::DaoNotFound(_) | GovernanceError::ProposalNotFound(_) => {
                ErrorKind::NotFound
            }
            GovernanceError::DaoInactive(_) => ErrorKind::DaoInactive,
            GovernanceError::NotAuthorized(_) | GovernanceError::NotMember { .. } => {
                ErrorKind::NotAuthorized
            }
            GovernanceError::AlreadyMember { .. } => ErrorKind::AlreadyMember,
            GovernanceError::AlreadyGovernor(_)
            | GovernanceError::NotGovernor(_)
            | GovernanceError::VotingOpen(_)
            | GovernanceError::StateConflict(_) => ErrorKind::StateConflict,
            GovernanceError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            GovernanceError::InvalidInput(_) => ErrorKind::InvalidInput,
            GovernanceError::InsufficientStake { .. } => ErrorKind::InsufficientStake,
            GovernanceError::InsufficientTreasury { .. } => ErrorKind::InsufficientTreasury,
            GovernanceError::UnstakeRestricted(_) => ErrorKind::UnstakeRestricted,
            GovernanceError::InsufficientVotingPower(_) => ErrorKind::InsufficientVotingPower,
            GovernanceError::AlreadyVoted { .. } => ErrorKind::AlreadyVoted,
            GovernanceError::VotingClosed(_) => ErrorKind::VotingClosed,
            GovernanceError::NotPassed(_) => ErrorKind::NotPassed,
            GovernanceError::ExecutionDelayNotElapsed { .. } => ErrorKind::ExecutionDelayNotElapsed,
        }
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use portal_common::BasisPoints;

    pub fn account(name: &str) -> AccountId {
        AccountId::from(name)
    }

    pub fn settings() -> DaoSettings {
        DaoSettings {
            voting_period: 86_400,
            execution_delay: 3_600,
            voting_delay: 0,
            quorum_threshold: BasisPoints::new(2_000),
            proposal_threshold: Amount::new(100_000_000),
            community_pool: BasisPoints::new(4_000),
            governor_pool: BasisPoints::new(6_000),
        }
    }

    /// A DAO created by `creator` at t=1000 with the given extra members
    pub fn dao_with(creator: &str, members: &[&str]) -> Dao {
        let mut dao = Dao::new(
            DaoId::new(1),
            "INVITE01".to_string(),
            "Test DAO".to_string(),
            "A DAO for tests".to_string(),
            account(creator),
            settings(),
            1_000,
        )
        .unwrap();
        for member in members {
            dao.join(account(member)).unwrap();
        }
        dao
    }
}
