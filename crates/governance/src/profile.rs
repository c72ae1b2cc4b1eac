//! Platform-wide user profiles

use std::collections::BTreeSet;

use portal_common::{AccountId, Amount, DaoId, Timestamp};
use serde::{Deserialize, Serialize};

/// Reputation awarded for each distributed bounty
pub const TASK_REPUTATION_REWARD: u64 = 10;

/// Highest role a user has held anywhere on the platform.
///
/// Variants are ordered so a profile's role only ever moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Member,
    Delegate,
    Governor,
    DaoCreator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub address: AccountId,
    pub role: GlobalRole,
    pub reputation: u64,
    /// Total bounty value earned from completed tasks
    pub contribution_score: Amount,
    pub premium_until: Option<Timestamp>,
    /// Proposals created plus votes cast, across all DAOs
    pub governance_participation: u64,
    pub daos: BTreeSet<DaoId>,
    pub created_at: Timestamp,
}

impl UserProfile {
    pub fn new(address: AccountId, now: Timestamp) -> Self {
        Self {
            address,
            role: GlobalRole::Member,
            reputation: 0,
            contribution_score: Amount::ZERO,
            premium_until: None,
            governance_participation: 0,
            daos: BTreeSet::new(),
            created_at: now,
        }
    }

    /// Raise the role to at least `role`
    pub fn upgrade_role(&mut self, role: GlobalRole) {
        self.role = self.role.max(role);
    }

    pub fn is_premium(&self, now: Timestamp) -> bool {
        self.premium_until.map_or(false, |until| now < until)
    }

    /// Record a premium expiry reported by the payment collaborator
    pub fn grant_premium(&mut self, until: Timestamp) {
        self.premium_until = Some(until);
    }

    pub fn record_membership(&mut self, dao: DaoId) {
        self.daos.insert(dao);
    }

    pub fn forget_membership(&mut self, dao: DaoId) {
        self.daos.remove(&dao);
    }

    pub fn record_participation(&mut self) {
        self.governance_participation = self.governance_participation.saturating_add(1);
    }

    pub fn record_bounty(&mut self, bounty: Amount) {
        self.contribution_score = Amount::new(
            self.contribution_score.value().saturating_add(bounty.value()),
        );
        self.reputation = self.reputation.saturating_add(TASK_REPUTATION_REWARD);
    }
}
