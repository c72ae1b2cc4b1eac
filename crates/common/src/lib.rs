//! Common types and utilities for the Portal governance engine
//!
//! Everything here is shared by the governance, economic and node crates:
//! identifiers, fixed-point amounts, the clock abstraction, the error
//! taxonomy callers branch on, and logging setup.

pub mod clock;
pub mod error;
pub mod logging;
pub mod types;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, ErrorKind, Result};
pub use types::{AccountId, Amount, BasisPoints, DaoId, ProposalId, TaskId, Timestamp};
