//! Proposal execution
//!
//! Executing a passed proposal applies its [`ProposalAction`] to the DAO.
//! Effects that leave the DAO (a treasury transfer credited to an outside
//! account) are returned to the caller as an [`ExecutionEffect`].

use portal_common::{AccountId, Amount, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dao::{Dao, DaoSettings};
use crate::proposals::{ProposalAction, ProposalEngine, ProposalState};
use crate::{GovernanceError, GovernanceResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEffect {
    None,
    /// The treasury was debited; the recipient must be credited
    TreasuryTransfer { recipient: AccountId, amount: Amount },
    SettingsUpdated { settings: DaoSettings },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub proposal_id: ProposalId,
    pub executed_at: Timestamp,
    pub effect: ExecutionEffect,
}

impl ProposalAction {
    /// Check the action is well formed against the current settings
    pub fn validate(&self, settings: &DaoSettings) -> GovernanceResult<()> {
        match self {
            ProposalAction::Signal => Ok(()),
            ProposalAction::TreasuryTransfer { amount, .. } => {
                if amount.is_zero() {
                    return Err(GovernanceError::InvalidAmount(
                        "treasury transfer amount must be positive".to_string(),
                    ));
                }
                Ok(())
            }
            ProposalAction::UpdateSettings {
                voting_period,
                execution_delay,
                quorum_threshold,
                proposal_threshold,
            } => {
                if voting_period.is_none()
                    && execution_delay.is_none()
                    && quorum_threshold.is_none()
                    && proposal_threshold.is_none()
                {
                    return Err(GovernanceError::InvalidInput(
                        "settings update changes nothing".to_string(),
                    ));
                }
                self.updated_settings(settings).map(|_| ())
            }
        }
    }

    /// The settings that result from applying an `UpdateSettings` action
    fn updated_settings(&self, current: &DaoSettings) -> GovernanceResult<DaoSettings> {
        let mut next = current.clone();
        if let ProposalAction::UpdateSettings {
            voting_period,
            execution_delay,
            quorum_threshold,
            proposal_threshold,
        } = self
        {
            if let Some(v) = voting_period {
                next.voting_period = *v;
            }
            if let Some(v) = execution_delay {
                next.execution_delay = *v;
            }
            if let Some(v) = quorum_threshold {
                next.quorum_threshold = *v;
            }
            if let Some(v) = proposal_threshold {
                next.proposal_threshold = *v;
            }
        }
        next.validate()?;
        Ok(next)
    }
}

impl ProposalEngine {
    /// Execute a passed proposal once its execution delay has elapsed.
    ///
    /// Nothing is mutated unless the payload applies cleanly.
    pub fn execute(
        &mut self,
        dao: &mut Dao,
        id: ProposalId,
        caller: &AccountId,
        now: Timestamp,
    ) -> GovernanceResult<ExecutionReceipt> {
        let proposal = self.get_mut(id)?;
        proposal.settle(now);
        match proposal.state {
            ProposalState::Passed => {}
            ProposalState::Executed | ProposalState::Canceled => {
                return Err(GovernanceError::StateConflict(format!(
                    "proposal {} is {:?}",
                    id, proposal.state
                )))
            }
            _ => return Err(GovernanceError::NotPassed(id)),
        }
        if now < proposal.execution_time {
            return Err(GovernanceError::ExecutionDelayNotElapsed {
                proposal: id,
                execution_time: proposal.execution_time,
            });
        }
        dao.ensure_member(caller)?;

        let effect = match &proposal.action {
            ProposalAction::Signal => ExecutionEffect::None,
            ProposalAction::TreasuryTransfer { recipient, amount } => {
                let remaining = dao.treasury_balance.checked_sub(*amount).ok_or(
                    GovernanceError::InsufficientTreasury {
                        requested: *amount,
                        available: dao.treasury_balance,
                    },
                )?;
                dao.treasury_balance = remaining;
                ExecutionEffect::TreasuryTransfer {
                    recipient: recipient.clone(),
                    amount: *amount,
                }
            }
            action @ ProposalAction::UpdateSettings { .. } => {
                let settings = action.updated_settings(&dao.settings)?;
                dao.settings = settings.clone();
                ExecutionEffect::SettingsUpdated { settings }
            }
        };

        proposal.state = ProposalState::Executed;
        proposal.executed_at = Some(now);
        info!("proposal {} of DAO {} executed by {}", id, dao.id, caller);

        Ok(ExecutionReceipt {
            proposal_id: id,
            executed_at: now,
            effect,
        })
    }
}
