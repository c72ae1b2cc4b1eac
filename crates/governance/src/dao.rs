//! DAO records and the membership registry
//!
//! A [`Dao`] owns its member and governor sets. Every role transition goes
//! through a method here so the set invariants hold after each call:
//! governors and the creator are always members, and the creator is never
//! removed.

use std::collections::BTreeSet;

use portal_common::{AccountId, Amount, BasisPoints, DaoId, Timestamp};
use portal_config::DaoDefaults;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{GovernanceError, GovernanceResult};

/// Per-DAO governance parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoSettings {
    /// Seconds a proposal accepts votes
    pub voting_period: u64,
    /// Seconds between the end of voting and the earliest execution
    pub execution_delay: u64,
    /// Seconds between creation and the start of voting
    pub voting_delay: u64,
    pub quorum_threshold: BasisPoints,
    /// Stake required to create proposals without a privileged role
    pub proposal_threshold: Amount,
    /// Share of total voting power distributed by stake
    pub community_pool: BasisPoints,
    /// Share of total voting power split among the creator and governors
    pub governor_pool: BasisPoints,
}

impl DaoSettings {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidInput(
                "voting period must be positive".to_string(),
            ));
        }
        if !self.quorum_threshold.is_fraction() {
            return Err(GovernanceError::InvalidInput(format!(
                "quorum threshold {} exceeds 100%",
                self.quorum_threshold
            )));
        }
        if self.community_pool.saturating_add(self.governor_pool) != BasisPoints::MAX {
            return Err(GovernanceError::InvalidInput(format!(
                "voting pools must sum to 100% (community {}, governor {})",
                self.community_pool, self.governor_pool
            )));
        }
        Ok(())
    }
}

impl From<&DaoDefaults> for DaoSettings {
    fn from(defaults: &DaoDefaults) -> Self {
        Self {
            voting_period: defaults.voting_period_secs,
            execution_delay: defaults.execution_delay_secs,
            voting_delay: defaults.voting_delay_secs,
            quorum_threshold: defaults.quorum_threshold,
            proposal_threshold: defaults.proposal_threshold,
            community_pool: defaults.community_pool,
            governor_pool: defaults.governor_pool,
        }
    }
}

/// A member's role within one DAO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaoRole {
    Creator,
    Governor,
    Member,
}

/// A DAO and its membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dao {
    pub id: DaoId,
    pub invite_code: String,
    pub name: String,
    pub description: String,
    pub creator: AccountId,
    governors: BTreeSet<AccountId>,
    members: BTreeSet<AccountId>,
    /// Sum of all stake positions; kept in step by the staking ledger
    pub total_staked: Amount,
    pub treasury_balance: Amount,
    pub settings: DaoSettings,
    pub active: bool,
    pub created_at: Timestamp,
    pub proposal_count: u64,
    pub task_count: u64,
}

impl Dao {
    /// Create a DAO whose only member is its creator
    pub fn new(
        id: DaoId,
        invite_code: String,
        name: String,
        description: String,
        creator: AccountId,
        settings: DaoSettings,
        now: Timestamp,
    ) -> GovernanceResult<Self> {
        if name.trim().is_empty() {
            return Err(GovernanceError::InvalidInput("DAO name is empty".to_string()));
        }
        settings.validate()?;

        let mut members = BTreeSet::new();
        members.insert(creator.clone());

        Ok(Self {
            id,
            invite_code,
            name,
            description,
            creator,
            governors: BTreeSet::new(),
            members,
            total_staked: Amount::ZERO,
            treasury_balance: Amount::ZERO,
            settings,
            active: true,
            created_at: now,
            proposal_count: 0,
            task_count: 0,
        })
    }

    pub fn is_member(&self, account: &AccountId) -> bool {
        self.members.contains(account)
    }

    pub fn is_governor(&self, account: &AccountId) -> bool {
        self.governors.contains(account)
    }

    pub fn is_creator(&self, account: &AccountId) -> bool {
        &self.creator == account
    }

    /// Creator or governor
    pub fn is_privileged(&self, account: &AccountId) -> bool {
        self.is_creator(account) || self.is_governor(account)
    }

    /// Size of the set sharing the governor pool: the creator plus governors
    pub fn privileged_count(&self) -> u64 {
        let extra = if self.governors.contains(&self.creator) { 0 } else { 1 };
        self.governors.len() as u64 + extra
    }

    pub fn role_of(&self, account: &AccountId) -> Option<DaoRole> {
        if self.is_creator(account) {
            Some(DaoRole::Creator)
        } else if self.is_governor(account) {
            Some(DaoRole::Governor)
        } else if self.is_member(account) {
            Some(DaoRole::Member)
        } else {
            None
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &AccountId> {
        self.members.iter()
    }

    pub fn governors(&self) -> impl Iterator<Item = &AccountId> {
        self.governors.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn ensure_active(&self) -> GovernanceResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(GovernanceError::DaoInactive(self.id))
        }
    }

    pub fn ensure_member(&self, account: &AccountId) -> GovernanceResult<()> {
        if self.is_member(account) {
            Ok(())
        } else {
            Err(GovernanceError::NotMember {
                dao: self.id,
                account: account.clone(),
            })
        }
    }

    fn ensure_creator(&self, caller: &AccountId, action: &str) -> GovernanceResult<()> {
        if self.is_creator(caller) {
            Ok(())
        } else {
            Err(GovernanceError::NotAuthorized(format!(
                "only the creator of DAO {} may {}",
                self.id, action
            )))
        }
    }

    /// Admit a new member
    pub fn join(&mut self, account: AccountId) -> GovernanceResult<()> {
        self.ensure_active()?;
        if self.is_member(&account) {
            return Err(GovernanceError::AlreadyMember {
                dao: self.id,
                account,
            });
        }
        debug!("{} joined DAO {}", account, self.id);
        self.members.insert(account);
        Ok(())
    }

    /// Grant the governor role to an existing member
    pub fn promote_governor(&mut self, caller: &AccountId, target: &AccountId) -> GovernanceResult<()> {
        self.ensure_creator(caller, "promote governors")?;
        self.ensure_member(target)?;
        if self.is_governor(target) {
            return Err(GovernanceError::AlreadyGovernor(target.clone()));
        }
        self.governors.insert(target.clone());
        info!("{} promoted to governor of DAO {}", target, self.id);
        Ok(())
    }

    /// Revoke the governor role; the account stays a member
    pub fn demote_governor(&mut self, caller: &AccountId, target: &AccountId) -> GovernanceResult<()> {
        self.ensure_creator(caller, "demote governors")?;
        if !self.governors.remove(target) {
            return Err(GovernanceError::NotGovernor(target.clone()));
        }
        info!("{} demoted from governor of DAO {}", target, self.id);
        Ok(())
    }

    /// Hand the creator seat to another member.
    ///
    /// The previous creator remains an ordinary member.
    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: &AccountId) -> GovernanceResult<()> {
        self.ensure_creator(caller, "transfer ownership")?;
        self.ensure_member(new_owner)?;
        if self.is_creator(new_owner) {
            return Err(GovernanceError::StateConflict(format!(
                "{} already owns DAO {}",
                new_owner, self.id
            )));
        }
        info!("DAO {} ownership transferred from {} to {}", self.id, self.creator, new_owner);
        self.creator = new_owner.clone();
        Ok(())
    }

    /// Remove a member who holds no stake.
    ///
    /// The creator may remove anyone but themselves; a governor may remove
    /// ordinary members only.
    pub fn remove_member(
        &mut self,
        caller: &AccountId,
        target: &AccountId,
        target_stake: Amount,
    ) -> GovernanceResult<()> {
        if !self.is_privileged(caller) {
            return Err(GovernanceError::NotAuthorized(format!(
                "only the creator or a governor of DAO {} may remove members",
                self.id
            )));
        }
        self.ensure_member(target)?;
        if self.is_creator(target) {
            return Err(GovernanceError::StateConflict(
                "the creator cannot be removed".to_string(),
            ));
        }
        if self.is_governor(target) && !self.is_creator(caller) {
            return Err(GovernanceError::NotAuthorized(
                "only the creator may remove a governor".to_string(),
            ));
        }
        if !target_stake.is_zero() {
            return Err(GovernanceError::StateConflict(format!(
                "{} still has {} staked",
                target, target_stake
            )));
        }

        self.governors.remove(target);
        self.members.remove(target);
        info!("{} removed from DAO {} by {}", target, self.id, caller);
        Ok(())
    }

    /// Activate or deactivate the DAO
    pub fn set_active(&mut self, caller: &AccountId, active: bool) -> GovernanceResult<()> {
        self.ensure_creator(caller, "change its status")?;
        self.active = active;
        info!("DAO {} active = {}", self.id, active);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{account, dao_with, settings};
    use portal_common::ErrorKind;

    #[test]
    fn test_new_dao_has_creator_as_member() {
        let dao = dao_with("alice", &[]);
        assert!(dao.is_member(&account("alice")));
        assert_eq!(dao.role_of(&account("alice")), Some(DaoRole::Creator));
        assert_eq!(dao.privileged_count(), 1);
        assert!(dao.active);
    }

    #[test]
    fn test_rejects_bad_settings() {
        let mut bad = settings();
        bad.community_pool = BasisPoints::new(5_000);
        let err = Dao::new(DaoId::new(2), "X".into(), "n".into(), String::new(), account("a"), bad, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = Dao::new(DaoId::new(2), "X".into(), "  ".into(), String::new(), account("a"), settings(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_join_twice_fails() {
        let mut dao = dao_with("alice", &["bob"]);
        let err = dao.join(account("bob")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyMember);
        assert_eq!(dao.member_count(), 2);
    }

    #[test]
    fn test_join_inactive_dao_fails() {
        let mut dao = dao_with("alice", &[]);
        dao.set_active(&account("alice"), false).unwrap();
        assert_eq!(dao.join(account("bob")).unwrap_err().kind(), ErrorKind::DaoInactive);
    }

    #[test]
    fn test_promote_and_demote() {
        let mut dao = dao_with("alice", &["bob", "carol"]);

        let err = dao.promote_governor(&account("bob"), &account("carol")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let err = dao.promote_governor(&account("alice"), &account("dave")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        dao.promote_governor(&account("alice"), &account("bob")).unwrap();
        assert_eq!(dao.role_of(&account("bob")), Some(DaoRole::Governor));
        assert_eq!(dao.privileged_count(), 2);

        let err = dao.promote_governor(&account("alice"), &account("bob")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        dao.demote_governor(&account("alice"), &account("bob")).unwrap();
        assert_eq!(dao.role_of(&account("bob")), Some(DaoRole::Member));
        assert!(dao.demote_governor(&account("alice"), &account("bob")).is_err());
    }

    #[test]
    fn test_transfer_ownership() {
        let mut dao = dao_with("alice", &["bob"]);
        dao.transfer_ownership(&account("alice"), &account("bob")).unwrap();
        assert!(dao.is_creator(&account("bob")));
        assert_eq!(dao.role_of(&account("alice")), Some(DaoRole::Member));

        let err = dao.transfer_ownership(&account("alice"), &account("bob")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn test_creator_who_is_governor_counts_once() {
        let mut dao = dao_with("alice", &["bob"]);
        dao.promote_governor(&account("alice"), &account("bob")).unwrap();
        dao.transfer_ownership(&account("alice"), &account("bob")).unwrap();
        assert_eq!(dao.privileged_count(), 1);
    }

    #[test]
    fn test_remove_member_rules() {
        let mut dao = dao_with("alice", &["bob", "carol", "dave"]);
        dao.promote_governor(&account("alice"), &account("bob")).unwrap();

        // members cannot remove
        let err = dao.remove_member(&account("carol"), &account("dave"), Amount::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        // governors cannot remove the creator or other governors
        assert!(dao.remove_member(&account("bob"), &account("alice"), Amount::ZERO).is_err());

        // stake blocks removal
        let err = dao.remove_member(&account("bob"), &account("dave"), Amount::new(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        dao.remove_member(&account("bob"), &account("dave"), Amount::ZERO).unwrap();
        assert!(!dao.is_member(&account("dave")));

        dao.remove_member(&account("alice"), &account("bob"), Amount::ZERO).unwrap();
        assert!(!dao.is_governor(&account("bob")));
        assert_eq!(dao.privileged_count(), 1);
    }
}
