//! Proposal lifecycle
//!
//! ```text
//! Pending ──▶ Active ──▶ Passed ──▶ Executed
//!    │          │   └──▶ Rejected
//!    └──────────┴──────────┴──▶ Canceled
//! ```
//!
//! `Pending` is only used when the DAO has a voting delay. Time-driven
//! transitions are applied lazily: mutations settle the stored proposal,
//! reads settle a copy. Settlement depends only on the recorded tally and the
//! proposal's own thresholds, so it gives the same answer whenever it runs.

use std::collections::BTreeMap;

use portal_common::{AccountId, Amount, BasisPoints, DaoId, ProposalId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dao::Dao;
use crate::staking::StakingLedger;
use crate::voting::{self, Tally, TallyResult, VoteChoice};
use crate::{GovernanceError, GovernanceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Pending,
    Active,
    Passed,
    Rejected,
    Executed,
    Canceled,
}

impl ProposalState {
    /// No further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalState::Executed | ProposalState::Canceled)
    }
}

/// What a proposal does when executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposalAction {
    /// Records the DAO's opinion; no effect on state
    Signal,
    TreasuryTransfer {
        recipient: AccountId,
        amount: Amount,
    },
    /// Changes the settings used by future proposals
    UpdateSettings {
        #[serde(default)]
        voting_period: Option<u64>,
        #[serde(default)]
        execution_delay: Option<u64>,
        #[serde(default)]
        quorum_threshold: Option<BasisPoints>,
        #[serde(default)]
        proposal_threshold: Option<Amount>,
    },
}

impl Default for ProposalAction {
    fn default() -> Self {
        ProposalAction::Signal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub dao_id: DaoId,
    pub title: String,
    pub description: String,
    pub proposer: AccountId,
    pub action: ProposalAction,
    pub linked_task: Option<TaskId>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub execution_time: Timestamp,
    pub tally: Tally,
    /// Fixed from the DAO settings at creation
    pub quorum_threshold: BasisPoints,
    pub state: ProposalState,
    pub created_at: Timestamp,
    pub finalized_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
}

impl Proposal {
    pub fn result(&self) -> TallyResult {
        self.tally.decide(self.quorum_threshold)
    }

    /// The state this proposal is in at `now`, without modifying it
    pub fn state_at(&self, now: Timestamp) -> ProposalState {
        let mut state = self.state;
        if state == ProposalState::Pending && now >= self.start_time {
            state = ProposalState::Active;
        }
        if state == ProposalState::Active && now >= self.end_time {
            state = if self.result().passed {
                ProposalState::Passed
            } else {
                ProposalState::Rejected
            };
        }
        state
    }

    /// Apply time-driven transitions; returns whether the state changed
    pub fn settle(&mut self, now: Timestamp) -> bool {
        let next = self.state_at(now);
        if next == self.state {
            return false;
        }
        if matches!(next, ProposalState::Passed | ProposalState::Rejected) {
            // the outcome was fixed when voting closed, whenever we notice it
            self.finalized_at = Some(self.end_time);
        }
        debug!("proposal {} settled {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// A settled copy for read paths
    pub fn settled(&self, now: Timestamp) -> Proposal {
        let mut copy = self.clone();
        copy.settle(now);
        copy
    }
}

/// A recorded vote with its power snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub voter: AccountId,
    pub choice: VoteChoice,
    pub voting_power: BasisPoints,
    pub cast_at: Timestamp,
}

/// Caller-supplied fields of a new proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub proposer: AccountId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: ProposalAction,
    #[serde(default)]
    pub linked_task: Option<TaskId>,
}

/// Why a decided proposal ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    Passed,
    QuorumNotMet,
    /// Quorum was met but `for` did not exceed `against`
    NoMajority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub proposal_id: ProposalId,
    pub state: ProposalState,
    pub tally: Tally,
    pub total_votes: BasisPoints,
    pub quorum_met: bool,
    /// Absent for proposals canceled before a decision
    pub reason: Option<OutcomeReason>,
}

impl FinalizeReport {
    fn for_proposal(proposal: &Proposal) -> Self {
        let result = proposal.result();
        let reason = match proposal.state {
            ProposalState::Canceled if proposal.finalized_at.is_none() => None,
            _ if result.passed => Some(OutcomeReason::Passed),
            _ if !result.quorum_met => Some(OutcomeReason::QuorumNotMet),
            _ => Some(OutcomeReason::NoMajority),
        };
        Self {
            proposal_id: proposal.id,
            state: proposal.state,
            tally: proposal.tally,
            total_votes: result.total_votes,
            quorum_met: result.quorum_met,
            reason,
        }
    }
}

/// All proposals and votes of one DAO
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalEngine {
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: BTreeMap<ProposalId, BTreeMap<AccountId, Vote>>,
}

impl ProposalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    pub fn contains(&self, id: ProposalId) -> bool {
        self.proposals.contains_key(&id)
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Proposals open for voting at `now`
    pub fn active_count(&self, now: Timestamp) -> usize {
        self.proposals
            .values()
            .filter(|p| p.state_at(now) == ProposalState::Active)
            .count()
    }

    pub fn votes_on(&self, id: ProposalId) -> impl Iterator<Item = &Vote> {
        self.votes.get(&id).into_iter().flat_map(|ballots| ballots.values())
    }

    pub fn vote_of(&self, id: ProposalId, voter: &AccountId) -> Option<&Vote> {
        self.votes.get(&id).and_then(|ballots| ballots.get(voter))
    }

    pub fn votes_by<'a>(&'a self, voter: &'a AccountId) -> impl Iterator<Item = &'a Vote> + 'a {
        self.votes.values().filter_map(move |ballots| ballots.get(voter))
    }

    /// Whether `account` has voted on a proposal still open at `now`
    pub fn has_open_vote(&self, account: &AccountId, now: Timestamp) -> bool {
        self.votes.iter().any(|(id, ballots)| {
            ballots.contains_key(account)
                && self
                    .proposals
                    .get(id)
                    .map_or(false, |p| p.state_at(now) == ProposalState::Active)
        })
    }

    pub(crate) fn get_mut(&mut self, id: ProposalId) -> GovernanceResult<&mut Proposal> {
        self.proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Create a proposal under `id`
    pub fn create(
        &mut self,
        dao: &mut Dao,
        stakes: &StakingLedger,
        id: ProposalId,
        draft: ProposalDraft,
        now: Timestamp,
    ) -> GovernanceResult<Proposal> {
        dao.ensure_active()?;
        if draft.title.trim().is_empty() {
            return Err(GovernanceError::InvalidInput("proposal title is empty".to_string()));
        }
        if self.proposals.contains_key(&id) {
            return Err(GovernanceError::StateConflict(format!("proposal {} already exists", id)));
        }
        let stake = stakes.stake_of(&draft.proposer);
        if !voting::can_create_proposal(dao, &draft.proposer, stake) {
            return Err(GovernanceError::NotAuthorized(format!(
                "{} must be a member holding a privileged role or at least {} staked to propose",
                draft.proposer, dao.settings.proposal_threshold
            )));
        }
        draft.action.validate(&dao.settings)?;

        let settings = &dao.settings;
        let overflow = || GovernanceError::InvalidInput("proposal schedule overflows".to_string());
        let start_time = now.checked_add(settings.voting_delay).ok_or_else(overflow)?;
        let end_time = start_time.checked_add(settings.voting_period).ok_or_else(overflow)?;
        let execution_time = end_time.checked_add(settings.execution_delay).ok_or_else(overflow)?;

        let state = if start_time > now {
            ProposalState::Pending
        } else {
            ProposalState::Active
        };

        let proposal = Proposal {
            id,
            dao_id: dao.id,
            title: draft.title,
            description: draft.description,
            proposer: draft.proposer,
            action: draft.action,
            linked_task: draft.linked_task,
            start_time,
            end_time,
            execution_time,
            tally: Tally::default(),
            quorum_threshold: settings.quorum_threshold,
            state,
            created_at: now,
            finalized_at: None,
            executed_at: None,
        };

        dao.proposal_count += 1;
        self.proposals.insert(id, proposal.clone());
        info!(
            "Created proposal {} in DAO {}: {} (voting {}..{})",
            id, dao.id, proposal.title, start_time, end_time
        );
        Ok(proposal)
    }

    /// Cast a vote with the voter's current power as its weight
    #[allow(clippy::too_many_arguments)]
    pub fn vote(
        &mut self,
        dao: &Dao,
        stakes: &StakingLedger,
        id: ProposalId,
        voter: &AccountId,
        choice: VoteChoice,
        min_stake: Amount,
        now: Timestamp,
    ) -> GovernanceResult<Vote> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        proposal.settle(now);
        match proposal.state {
            ProposalState::Active => {}
            ProposalState::Pending => {
                return Err(GovernanceError::StateConflict(format!(
                    "voting on proposal {} opens at {}",
                    id, proposal.start_time
                )))
            }
            ProposalState::Passed | ProposalState::Rejected => {
                return Err(GovernanceError::VotingClosed(id))
            }
            ProposalState::Executed | ProposalState::Canceled => {
                return Err(GovernanceError::StateConflict(format!(
                    "proposal {} is {:?}",
                    id, proposal.state
                )))
            }
        }

        let ballots = self.votes.entry(id).or_default();
        if ballots.contains_key(voter) {
            return Err(GovernanceError::AlreadyVoted {
                proposal: id,
                voter: voter.clone(),
            });
        }

        let stake = stakes.stake_of(voter);
        if !voting::can_vote(dao, voter, stake, min_stake) {
            return Err(GovernanceError::InsufficientVotingPower(format!(
                "{} must be a member holding a privileged role or at least {} staked",
                voter, min_stake
            )));
        }
        let power = voting::voting_power(dao, voter, stake).total();
        if power.is_zero() {
            return Err(GovernanceError::InsufficientVotingPower(format!(
                "{} has no voting power in DAO {}",
                voter, dao.id
            )));
        }

        let vote = Vote {
            proposal_id: id,
            voter: voter.clone(),
            choice,
            voting_power: power,
            cast_at: now,
        };
        proposal.tally.record(choice, power);
        ballots.insert(voter.clone(), vote.clone());
        debug!("{} voted {:?} on proposal {} with {}", voter, choice, id, power);
        Ok(vote)
    }

    /// Decide a proposal whose voting window has closed.
    ///
    /// Calling this again returns the same report.
    pub fn finalize(&mut self, id: ProposalId, now: Timestamp) -> GovernanceResult<FinalizeReport> {
        let proposal = self.get_mut(id)?;
        proposal.settle(now);
        if matches!(proposal.state, ProposalState::Pending | ProposalState::Active) {
            return Err(GovernanceError::VotingOpen(id));
        }
        let report = FinalizeReport::for_proposal(proposal);
        if report.reason == Some(OutcomeReason::QuorumNotMet) {
            info!("proposal {} did not reach quorum ({} of {})", id, report.total_votes, proposal.quorum_threshold);
        }
        Ok(report)
    }

    /// Cancel a proposal that has not been executed
    pub fn cancel(
        &mut self,
        dao: &Dao,
        id: ProposalId,
        caller: &AccountId,
        now: Timestamp,
    ) -> GovernanceResult<Proposal> {
        let proposal = self.get_mut(id)?;
        if &proposal.proposer != caller && !dao.is_privileged(caller) {
            return Err(GovernanceError::NotAuthorized(
                "only the proposer, the creator or a governor may cancel a proposal".to_string(),
            ));
        }
        proposal.settle(now);
        match proposal.state {
            ProposalState::Pending | ProposalState::Active | ProposalState::Passed => {}
            state => {
                return Err(GovernanceError::StateConflict(format!(
                    "proposal {} is {:?} and cannot be canceled",
                    id, state
                )))
            }
        }
        proposal.state = ProposalState::Canceled;
        info!("proposal {} canceled by {}", id, caller);
        Ok(proposal.clone())
    }

    /// Settle every proposal at `now`; returns how many changed state
    pub fn settle_all(&mut self, now: Timestamp) -> usize {
        self.proposals
            .values_mut()
            .map(|p| p.settle(now))
            .filter(|changed| *changed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{account, dao_with};
    use portal_common::ErrorKind;

    const MIN: Amount = Amount::new(1_000_000);

    fn draft(proposer: &str) -> ProposalDraft {
        ProposalDraft {
            proposer: account(proposer),
            title: "Fund the docs".to_string(),
            description: String::new(),
            action: ProposalAction::Signal,
            linked_task: None,
        }
    }

    #[test]
    fn test_create_sets_schedule() {
        let mut dao = dao_with("alice", &[]);
        let mut engine = ProposalEngine::new();
        let p = engine
            .create(&mut dao, &StakingLedger::new(), ProposalId::new(1), draft("alice"), 5_000)
            .unwrap();
        assert_eq!(p.state, ProposalState::Active);
        assert_eq!(p.start_time, 5_000);
        assert_eq!(p.end_time, 5_000 + 86_400);
        assert_eq!(p.execution_time, 5_000 + 86_400 + 3_600);
        assert_eq!(dao.proposal_count, 1);
    }

    #[test]
    fn test_create_with_voting_delay_starts_pending() {
        let mut dao = dao_with("alice", &[]);
        dao.settings.voting_delay = 100;
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &StakingLedger::new(), id, draft("alice"), 0).unwrap();
        assert_eq!(engine.get(id).unwrap().state, ProposalState::Pending);

        let err = engine
            .vote(&dao, &StakingLedger::new(), id, &account("alice"), VoteChoice::For, MIN, 50)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        engine
            .vote(&dao, &StakingLedger::new(), id, &account("alice"), VoteChoice::For, MIN, 100)
            .unwrap();
        assert_eq!(engine.get(id).unwrap().state, ProposalState::Active);
    }

    #[test]
    fn test_create_requires_eligibility() {
        let mut dao = dao_with("alice", &["bob"]);
        let mut engine = ProposalEngine::new();
        let err = engine
            .create(&mut dao, &StakingLedger::new(), ProposalId::new(1), draft("bob"), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let mut empty = draft("alice");
        empty.title = "   ".to_string();
        let err = engine
            .create(&mut dao, &StakingLedger::new(), ProposalId::new(1), empty, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(dao.proposal_count, 0);
    }

    #[test]
    fn test_vote_rules() {
        let mut dao = dao_with("alice", &["bob", "carol"]);
        let mut stakes = StakingLedger::new();
        stakes.stake(&mut dao, &account("bob"), MIN, MIN).unwrap();
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &stakes, id, draft("alice"), 0).unwrap();

        let vote = engine
            .vote(&dao, &stakes, id, &account("alice"), VoteChoice::For, MIN, 10)
            .unwrap();
        assert_eq!(vote.voting_power, BasisPoints::new(6_000));

        let err = engine
            .vote(&dao, &stakes, id, &account("alice"), VoteChoice::Against, MIN, 11)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyVoted);

        // carol has neither a role nor stake
        let err = engine
            .vote(&dao, &stakes, id, &account("carol"), VoteChoice::For, MIN, 12)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientVotingPower);

        engine
            .vote(&dao, &stakes, id, &account("bob"), VoteChoice::Against, MIN, 13)
            .unwrap();
        let tally = engine.get(id).unwrap().tally;
        assert_eq!(tally.for_votes, BasisPoints::new(6_000));
        assert_eq!(tally.against_votes, BasisPoints::new(4_000));
        assert_eq!(engine.votes_on(id).count(), 2);

        let err = engine
            .vote(&dao, &stakes, id, &account("carol"), VoteChoice::For, MIN, 86_400)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VotingClosed);
    }

    #[test]
    fn test_finalize_is_idempotent_and_time_independent() {
        let mut dao = dao_with("alice", &[]);
        let stakes = StakingLedger::new();
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &stakes, id, draft("alice"), 0).unwrap();

        let err = engine.finalize(id, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let mut later = engine.clone();
        let first = engine.finalize(id, 86_400).unwrap();
        assert_eq!(first.state, ProposalState::Rejected);
        assert_eq!(first.reason, Some(OutcomeReason::QuorumNotMet));
        assert_eq!(engine.finalize(id, 90_000).unwrap(), first);
        assert_eq!(later.finalize(id, 1_000_000).unwrap(), first);
        assert_eq!(later.get(id), engine.get(id));
    }

    #[test]
    fn test_cancel() {
        let mut dao = dao_with("alice", &["bob"]);
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &StakingLedger::new(), id, draft("alice"), 0).unwrap();

        let err = engine.cancel(&dao, id, &account("bob"), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let canceled = engine.cancel(&dao, id, &account("alice"), 10).unwrap();
        assert_eq!(canceled.state, ProposalState::Canceled);
        let report = engine.finalize(id, 100_000).unwrap();
        assert_eq!(report.state, ProposalState::Canceled);
        assert_eq!(report.reason, None);

        let err = engine.cancel(&dao, id, &account("alice"), 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_rejected_cannot_be_canceled() {
        let mut dao = dao_with("alice", &[]);
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &StakingLedger::new(), id, draft("alice"), 0).unwrap();
        let err = engine.cancel(&dao, id, &account("alice"), 86_400).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(engine.get(id).unwrap().state, ProposalState::Rejected);
    }

    #[test]
    fn test_has_open_vote() {
        let mut dao = dao_with("alice", &[]);
        let stakes = StakingLedger::new();
        let mut engine = ProposalEngine::new();
        let id = ProposalId::new(1);
        engine.create(&mut dao, &stakes, id, draft("alice"), 0).unwrap();
        assert!(!engine.has_open_vote(&account("alice"), 1));
        engine.vote(&dao, &stakes, id, &account("alice"), VoteChoice::Abstain, MIN, 1).unwrap();
        assert!(engine.has_open_vote(&account("alice"), 2));
        assert!(!engine.has_open_vote(&account("alice"), 86_400));
    }

    #[test]
    fn test_settle_all() {
        let mut dao = dao_with("alice", &[]);
        let stakes = StakingLedger::new();
        let mut engine = ProposalEngine::new();
        engine.create(&mut dao, &stakes, ProposalId::new(1), draft("alice"), 0).unwrap();
        engine.create(&mut dao, &stakes, ProposalId::new(2), draft("alice"), 50_000).unwrap();
        assert_eq!(engine.settle_all(86_400), 1);
        assert_eq!(engine.active_count(86_400), 1);
        assert_eq!(engine.settle_all(86_400), 0);
    }

    #[test]
    fn test_action_wire_format() {
        let action: ProposalAction = serde_json::from_str(
            r#"{"type":"update_settings","quorum_threshold":3000}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            ProposalAction::UpdateSettings {
                voting_period: None,
                execution_delay: None,
                quorum_threshold: Some(BasisPoints::new(3_000)),
                proposal_threshold: None,
            }
        );
        let signal = serde_json::to_value(ProposalAction::Signal).unwrap();
        assert_eq!(signal, serde_json::json!({"type": "signal"}));
    }
}
