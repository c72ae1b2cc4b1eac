//! The multi-tenant platform service
//!
//! Each DAO's [`DaoState`] lives behind its own `tokio::sync::Mutex`; every
//! intent locks exactly one DAO, validates, then mutates. Only a snapshot
//! holds several DAO locks, always taken in id order. Cross-DAO indices,
//! user profiles and released funds live in concurrent maps that are only
//! touched while a DAO lock is held (DAO lock first, then map shard) or with
//! no DAO lock at all, and no map guard is ever held across an `.await`.

mod bounties;
mod governance;
mod membership;

pub use bounties::NewTask;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use portal_common::utils::generate_invite_code;
use portal_common::{AccountId, Clock, DaoId, ProposalId, SystemClock, TaskId, Timestamp};
use portal_config::PlatformConfig;
use portal_economic::{AccountBook, EconomicError};
use portal_governance::{GovernanceError, UserProfile};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PortalError, PortalResult};
use crate::state::DaoState;

/// Attempts at drawing an unused invite code before giving up
const INVITE_CODE_ATTEMPTS: usize = 16;

pub(crate) type DaoHandle = Arc<Mutex<DaoState>>;

pub struct Platform {
    pub(crate) config: PlatformConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) daos: DashMap<DaoId, DaoHandle>,
    pub(crate) invite_codes: DashMap<String, DaoId>,
    pub(crate) proposal_index: DashMap<ProposalId, DaoId>,
    pub(crate) task_index: DashMap<TaskId, DaoId>,
    pub(crate) profiles: DashMap<AccountId, UserProfile>,
    pub(crate) accounts: AccountBook,
    pub(crate) next_dao_id: AtomicU64,
    pub(crate) next_proposal_id: AtomicU64,
    pub(crate) next_task_id: AtomicU64,
}

impl Platform {
    /// Create an empty platform
    pub fn new(config: PlatformConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            daos: DashMap::new(),
            invite_codes: DashMap::new(),
            proposal_index: DashMap::new(),
            task_index: DashMap::new(),
            profiles: DashMap::new(),
            accounts: AccountBook::new(),
            next_dao_id: AtomicU64::new(1),
            next_proposal_id: AtomicU64::new(1),
            next_task_id: AtomicU64::new(1),
        }
    }

    /// Create an empty platform on wall-clock time
    pub fn with_system_clock(config: PlatformConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn dao_count(&self) -> usize {
        self.daos.len()
    }

    pub(crate) fn dao_handle(&self, id: DaoId) -> PortalResult<DaoHandle> {
        self.daos
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GovernanceError::DaoNotFound(id).into())
    }

    pub(crate) fn proposal_handle(&self, id: ProposalId) -> PortalResult<DaoHandle> {
        let dao_id = self
            .proposal_index
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        self.dao_handle(dao_id)
    }

    pub(crate) fn task_handle(&self, id: TaskId) -> PortalResult<DaoHandle> {
        let dao_id = self
            .task_index
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(EconomicError::TaskNotFound(id))?;
        self.dao_handle(dao_id)
    }

    /// Every DAO handle, collected so no map guard outlives the call
    pub(crate) fn dao_handles(&self) -> Vec<DaoHandle> {
        self.daos.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Apply `f` to the caller's profile, creating it on first use
    pub(crate) fn touch_profile<F>(&self, account: &AccountId, now: Timestamp, f: F)
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut profile = self
            .profiles
            .entry(account.clone())
            .or_insert_with(|| UserProfile::new(account.clone(), now));
        f(&mut profile);
    }

    /// Apply `f` to an existing profile
    pub(crate) fn update_profile<F>(&self, account: &AccountId, f: F) -> PortalResult<UserProfile>
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut profile = self
            .profiles
            .get_mut(account)
            .ok_or_else(|| PortalError::ProfileNotFound(account.clone()))?;
        f(&mut profile);
        Ok(profile.clone())
    }

    /// Draw an invite code no other DAO uses and bind it to `dao_id`
    pub(crate) fn reserve_invite_code(&self, dao_id: DaoId) -> PortalResult<String> {
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            if let Entry::Vacant(slot) = self.invite_codes.entry(code.clone()) {
                slot.insert(dao_id);
                return Ok(code);
            }
            debug!("invite code collision on {}", code);
        }
        Err(PortalError::Internal(
            "could not generate a unique invite code".to_string(),
        ))
    }

    /// Settle the proposals of every DAO; returns how many changed state.
    ///
    /// Produces the same states lazy settlement would.
    pub async fn sweep(&self) -> usize {
        let now = self.now();
        let mut settled = 0;
        for handle in self.dao_handles() {
            settled += handle.lock().await.settle(now);
        }
        if settled > 0 {
            debug!("sweep settled {} proposals", settled);
        }
        settled
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("daos", &self.daos.len())
            .field("profiles", &self.profiles.len())
            .field("next_dao_id", &self.next_dao_id.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use portal_common::ManualClock;

    /// A platform on a manual clock starting at t=1000
    pub fn platform() -> (Arc<Platform>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let platform = Arc::new(Platform::new(PlatformConfig::default(), clock.clone()));
        (platform, clock)
    }

    pub fn account(name: &str) -> AccountId {
        AccountId::from(name)
    }
}
