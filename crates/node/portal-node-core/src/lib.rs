//! Core platform service for Portal
//!
//! This crate hosts many DAOs side by side: it routes authenticated intents
//! to the governance and economic engines under per-DAO locks, maintains the
//! cross-DAO indices and user profiles, and projects read models such as the
//! user ecosystem view.

mod ecosystem;
mod error;
mod intent;
mod persistence;
mod platform;
mod projections;
mod state;
mod sweeper;

pub use ecosystem::{DaoSummary, EcosystemTotals, UserDaoEntry, UserEcosystem};
pub use error::{PortalError, PortalResult};
pub use intent::{Intent, Outcome};
pub use platform::{NewTask, Platform};
pub use projections::{StakingInfo, VotingPowerBreakdown};
pub use state::DaoState;
pub use sweeper::Sweeper;
