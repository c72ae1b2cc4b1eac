//! DAO creation and membership intents

use std::sync::atomic::Ordering;
use std::sync::Arc;

use portal_common::utils::normalize_invite_code;
use portal_common::{AccountId, DaoId, Timestamp};
use portal_governance::{Dao, DaoSettings, GlobalRole, GovernanceError, UserProfile};
use tokio::sync::Mutex;
use tracing::info;

use super::Platform;
use crate::error::{PortalError, PortalResult};
use crate::state::DaoState;

impl Platform {
    /// Create a DAO owned by `caller`. Settings default to the configured
    /// DAO defaults.
    pub async fn create_dao(
        &self,
        caller: &AccountId,
        name: &str,
        description: &str,
        settings: Option<DaoSettings>,
    ) -> PortalResult<Dao> {
        let now = self.now();
        let settings = settings.unwrap_or_else(|| DaoSettings::from(&self.config.dao_defaults));
        let id = DaoId::new(self.next_dao_id.fetch_add(1, Ordering::SeqCst));
        let mut dao = Dao::new(
            id,
            String::new(),
            name.to_string(),
            description.to_string(),
            caller.clone(),
            settings,
            now,
        )?;
        dao.invite_code = self.reserve_invite_code(id)?;

        self.touch_profile(caller, now, |profile| {
            profile.upgrade_role(GlobalRole::DaoCreator);
            profile.record_membership(id);
        });
        self.daos.insert(id, Arc::new(Mutex::new(DaoState::new(dao.clone()))));
        info!("Created DAO {} '{}' (invite code {}) for {}", id, dao.name, dao.invite_code, caller);
        Ok(dao)
    }

    pub async fn join_dao_by_code(&self, caller: &AccountId, code: &str) -> PortalResult<Dao> {
        let code = normalize_invite_code(code);
        let dao_id = self
            .invite_codes
            .get(&code)
            .map(|entry| *entry.value())
            .ok_or_else(|| PortalError::InviteCodeNotFound(code.clone()))?;
        self.join_dao_by_id(caller, dao_id).await
    }

    pub async fn join_dao_by_id(&self, caller: &AccountId, dao_id: DaoId) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        state.dao.join(caller.clone())?;
        self.touch_profile(caller, self.now(), |profile| profile.record_membership(dao_id));
        info!("{} joined DAO {}", caller, dao_id);
        Ok(state.dao.clone())
    }

    pub async fn promote_to_governor(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        target: &AccountId,
    ) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        state.dao.promote_governor(caller, target)?;
        self.touch_profile(target, self.now(), |profile| {
            profile.upgrade_role(GlobalRole::Governor)
        });
        Ok(state.dao.clone())
    }

    pub async fn demote_governor(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        target: &AccountId,
    ) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        state.dao.demote_governor(caller, target)?;
        Ok(state.dao.clone())
    }

    pub async fn transfer_dao_ownership(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        new_owner: &AccountId,
    ) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        state.dao.transfer_ownership(caller, new_owner)?;
        self.touch_profile(new_owner, self.now(), |profile| {
            profile.upgrade_role(GlobalRole::DaoCreator)
        });
        Ok(state.dao.clone())
    }

    /// Remove a member who holds no stake in the DAO
    pub async fn remove_member(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        target: &AccountId,
    ) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        let stake = state.stakes.stake_of(target);
        state.dao.remove_member(caller, target, stake)?;
        if let Some(mut profile) = self.profiles.get_mut(target) {
            profile.forget_membership(dao_id);
        }
        Ok(state.dao.clone())
    }

    pub async fn set_dao_active(
        &self,
        caller: &AccountId,
        dao_id: DaoId,
        active: bool,
    ) -> PortalResult<Dao> {
        let handle = self.dao_handle(dao_id)?;
        let mut state = handle.lock().await;
        state.dao.set_active(caller, active)?;
        Ok(state.dao.clone())
    }

    /// Record a premium expiry reported by the payment collaborator; only
    /// configured premium operators may call this
    pub async fn grant_premium(&self, caller: &AccountId, user: &AccountId, until: Timestamp) -> PortalResult<UserProfile> {
        if !self.config.policies.premium_operators.contains(caller) {
            return Err(GovernanceError::NotAuthorized(format!("{} is not a premium operator", caller)).into());
        }
        let profile = self.update_profile(user, |profile| profile.grant_premium(until))?;
        info!("premium for {} recorded until {}", user, until);
        Ok(profile)
    }
}
