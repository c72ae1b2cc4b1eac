//! Platform error type

use portal_common::{AccountId, ErrorKind};
use portal_config::ConfigError;
use portal_economic::EconomicError;
use portal_governance::GovernanceError;
use portal_storage::StorageError;
use thiserror::Error;

/// Errors returned by the platform service
#[derive(Error, Debug)]
pub enum PortalError {
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error(transparent)]
    Economic(#[from] EconomicError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No DAO with invite code {0}")]
    InviteCodeNotFound(String),

    #[error("No profile for {0}")]
    ProfileNotFound(AccountId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Governance(e) => e.kind(),
            PortalError::Economic(e) => e.kind(),
            PortalError::Storage(e) => e.kind(),
            PortalError::Config(_) | PortalError::InvalidInput(_) => ErrorKind::InvalidInput,
            PortalError::InviteCodeNotFound(_) | PortalError::ProfileNotFound(_) => {
                ErrorKind::NotFound
            }
            PortalError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
