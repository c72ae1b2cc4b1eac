//! Snapshot save and restore
//!
//! Layout under the store:
//!
//! - `platform/header`: id counters and snapshot time
//! - `daos/{id}`: one [`DaoState`] per DAO
//! - `profiles/{hex address}`: one [`UserProfile`] per account
//! - `accounts/balances`: released funds
//!
//! Invite code, proposal and task indices are derived and rebuilt on load.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use portal_common::{AccountId, Amount, Clock, DaoId, Timestamp};
use portal_config::PlatformConfig;
use portal_economic::AccountBook;
use portal_governance::UserProfile;
use portal_storage::{JsonStore, StateStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PortalResult;
use crate::platform::{DaoHandle, Platform};
use crate::state::DaoState;

const HEADER_KEY: &str = "platform/header";
const DAOS_PREFIX: &str = "daos";
const PROFILES_PREFIX: &str = "profiles";
const BALANCES_KEY: &str = "accounts/balances";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SnapshotHeader {
    next_dao_id: u64,
    next_proposal_id: u64,
    next_task_id: u64,
    saved_at: Timestamp,
}

/// Platform state copied at one moment
struct Captured {
    states: Vec<DaoState>,
    profiles: Vec<UserProfile>,
    balances: BTreeMap<AccountId, Amount>,
    header: SnapshotHeader,
}

fn profile_key(account: &AccountId) -> String {
    format!("{}/{}", PROFILES_PREFIX, hex::encode(account.as_str()))
}

impl Platform {
    /// Whether `store` holds a snapshot
    pub async fn has_snapshot<S: StateStore + ?Sized>(store: &S) -> PortalResult<bool> {
        Ok(store.exists(HEADER_KEY).await?)
    }

    /// Write a snapshot of every DAO, profile and released balance.
    ///
    /// Every DAO lock is held, taken in id order, while the state is copied,
    /// so the snapshot reflects one moment: a bounty or transfer is either
    /// paid in both the DAO and the balances or in neither.
    pub async fn save_to<S: StateStore + ?Sized>(&self, store: &S) -> PortalResult<()> {
        let Captured {
            states,
            profiles,
            balances,
            header,
        } = self.capture().await;

        for state in &states {
            store
                .put_json(&format!("{}/{}", DAOS_PREFIX, state.dao.id), state)
                .await?;
        }
        for profile in &profiles {
            store.put_json(&profile_key(&profile.address), profile).await?;
        }
        store.put_json(BALANCES_KEY, &balances).await?;

        // written last so a partial save is never mistaken for a snapshot
        store.put_json(HEADER_KEY, &header).await?;

        info!("Saved snapshot: {} DAOs, {} profiles", states.len(), profiles.len());
        Ok(())
    }

    async fn capture(&self) -> Captured {
        let mut handles: Vec<(DaoId, DaoHandle)> = self
            .daos
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handles.sort_by_key(|(id, _)| *id);

        let mut guards = Vec::with_capacity(handles.len());
        for (_, handle) in &handles {
            guards.push(handle.lock().await);
        }

        let states: Vec<DaoState> = guards.iter().map(|state| (**state).clone()).collect();
        let profiles = self.profiles.iter().map(|entry| entry.value().clone()).collect();
        let balances = self.accounts.snapshot();
        let header = SnapshotHeader {
            next_dao_id: self.next_dao_id.load(Ordering::SeqCst),
            next_proposal_id: self.next_proposal_id.load(Ordering::SeqCst),
            next_task_id: self.next_task_id.load(Ordering::SeqCst),
            saved_at: self.now(),
        };
        drop(guards);
        debug!("captured {} DAOs for snapshot", states.len());
        Captured {
            states,
            profiles,
            balances,
            header,
        }
    }

    /// Rebuild a platform from a snapshot written by [`Platform::save_to`]
    pub async fn load_from<S: StateStore + ?Sized>(
        store: &S,
        config: PlatformConfig,
        clock: Arc<dyn Clock>,
    ) -> PortalResult<Platform> {
        let header: SnapshotHeader = store.get_json(HEADER_KEY).await?;
        let platform = Platform::new(config, clock);

        let mut next_dao_id = header.next_dao_id;
        let mut next_proposal_id = header.next_proposal_id;
        let mut next_task_id = header.next_task_id;

        for key in store.list(DAOS_PREFIX).await? {
            let state: DaoState = store.get_json(&key).await?;
            let dao_id = state.dao.id;
            debug!("restoring DAO {} from {}", dao_id, key);

            platform.invite_codes.insert(state.dao.invite_code.clone(), dao_id);
            for proposal in state.proposals.proposals() {
                platform.proposal_index.insert(proposal.id, dao_id);
                next_proposal_id = next_proposal_id.max(proposal.id.value() + 1);
            }
            for task in state.tasks.tasks() {
                platform.task_index.insert(task.id, dao_id);
                next_task_id = next_task_id.max(task.id.value() + 1);
            }
            next_dao_id = next_dao_id.max(dao_id.value() + 1);
            platform.daos.insert(dao_id, Arc::new(Mutex::new(state)));
        }

        for key in store.list(PROFILES_PREFIX).await? {
            let profile: UserProfile = store.get_json(&key).await?;
            platform.profiles.insert(profile.address.clone(), profile);
        }

        let balances: BTreeMap<AccountId, Amount> = store.try_get_json(BALANCES_KEY).await?.unwrap_or_default();
        let platform = Platform {
            accounts: AccountBook::from_snapshot(balances),
            ..platform
        };

        platform.next_dao_id.store(next_dao_id, Ordering::SeqCst);
        platform.next_proposal_id.store(next_proposal_id, Ordering::SeqCst);
        platform.next_task_id.store(next_task_id, Ordering::SeqCst);

        info!(
            "Loaded snapshot from t={}: {} DAOs, {} profiles",
            header.saved_at,
            platform.daos.len(),
            platform.profiles.len()
        );
        Ok(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_support::{account, platform};
    use crate::platform::NewTask;
    use portal_common::{ErrorKind, ManualClock};
    use portal_governance::{ProposalAction, VoteChoice};
    use async_trait::async_trait;
    use portal_common::TaskId;
    use portal_storage::{FileStore, MemoryStore, StorageResult};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    /// Pays out a bounty while the first DAO record is being written
    struct PayingStore {
        inner: MemoryStore,
        platform: Arc<Platform>,
        task: TaskId,
        paid: AtomicBool,
    }

    #[async_trait]
    impl StateStore for PayingStore {
        async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
            if key.starts_with(DAOS_PREFIX) && !self.paid.swap(true, Ordering::SeqCst) {
                self.platform.distribute_bounty(&account("alice"), self.task).await.unwrap();
            }
            self.inner.put(key, data).await
        }

        async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.inner.list(prefix).await
        }

        fn base_path(&self) -> Option<PathBuf> {
            None
        }
    }

    async fn populated() -> (Arc<Platform>, Arc<ManualClock>) {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        platform.join_dao_by_id(&account("bob"), dao.id).await.unwrap();
        platform.stake(&account("bob"), dao.id, Amount::new(5_000_000)).await.unwrap();
        platform.unstake(&account("bob"), dao.id, Amount::new(1_000_000)).await.unwrap();
        platform.deposit_treasury(&account("alice"), dao.id, Amount::new(300)).await.unwrap();
        let proposal = platform
            .create_proposal(&account("alice"), dao.id, "P", "", ProposalAction::Signal, None)
            .await
            .unwrap();
        platform.vote(&account("bob"), proposal.id, VoteChoice::For).await.unwrap();
        platform
            .create_task(
                &account("alice"),
                dao.id,
                NewTask {
                    title: "T".to_string(),
                    description: String::new(),
                    bounty_amount: Amount::new(100),
                    required_skills: Default::default(),
                    deadline: 50_000,
                    required_validations: 2,
                },
            )
            .await
            .unwrap();
        (platform, clock)
    }

    #[tokio::test]
    async fn test_round_trip_through_file_store() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let (platform, clock) = populated().await;
        assert!(!Platform::has_snapshot(&store).await.unwrap());
        platform.save_to(&store).await.unwrap();
        assert!(Platform::has_snapshot(&store).await.unwrap());

        let restored = Platform::load_from(&store, PlatformConfig::default(), clock.clone())
            .await
            .unwrap();
        let dao = platform.get_dao_by_id(1.into()).await.unwrap();
        assert_eq!(restored.get_dao_by_id(1.into()).await.unwrap(), dao);
        assert_eq!(restored.get_dao_by_code(&dao.invite_code).await.unwrap().id, dao.id);
        assert_eq!(restored.get_proposal_votes(1.into()).await.unwrap().len(), 1);
        assert_eq!(restored.get_task(1.into()).await.unwrap().bounty_amount, Amount::new(100));
        assert_eq!(restored.get_account_balance(&account("bob")), Amount::new(1_000_000));
        assert_eq!(
            restored.get_user_profile(&account("bob")).unwrap(),
            platform.get_user_profile(&account("bob")).unwrap()
        );

        // counters continue where they left off
        let next = restored.create_dao(&account("carol"), "E", "", None).await.unwrap();
        assert_eq!(next.id.value(), 2);
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        let (platform, clock) = populated().await;
        platform.save_to(&store).await.unwrap();

        let restored = Platform::load_from(&store, PlatformConfig::default(), clock).await.unwrap();
        let proposal = restored
            .create_proposal(&account("alice"), 1.into(), "Q", "", ProposalAction::Signal, None)
            .await
            .unwrap();
        assert_eq!(proposal.id.value(), 2);
    }

    #[tokio::test]
    async fn test_load_without_snapshot() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(0));
        let err = Platform::load_from(&store, PlatformConfig::default(), clock)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_payout_during_save_is_not_paid_twice() {
        let (platform, clock) = platform();
        let dao = platform.create_dao(&account("alice"), "D", "", None).await.unwrap();
        for member in ["bob", "carol", "dave"] {
            platform.join_dao_by_id(&account(member), dao.id).await.unwrap();
        }
        platform.deposit_treasury(&account("alice"), dao.id, Amount::new(500)).await.unwrap();
        let task = platform
            .create_task(
                &account("alice"),
                dao.id,
                NewTask {
                    title: "T".to_string(),
                    description: String::new(),
                    bounty_amount: Amount::new(500),
                    required_skills: Default::default(),
                    deadline: 50_000,
                    required_validations: 2,
                },
            )
            .await
            .unwrap();
        platform.assign_task(&account("bob"), task.id, &account("bob")).await.unwrap();
        platform.submit_task(&account("bob"), task.id, "beef", None).await.unwrap();
        platform.validate_task(&account("carol"), task.id, true).await.unwrap();
        platform.validate_task(&account("dave"), task.id, true).await.unwrap();

        let store = PayingStore {
            inner: MemoryStore::new(),
            platform: platform.clone(),
            task: task.id,
            paid: AtomicBool::new(false),
        };
        platform.save_to(&store).await.unwrap();
        assert_eq!(platform.get_account_balance(&account("bob")), Amount::new(500));

        // the snapshot predates the payout in both the task and the balances
        let restored = Platform::load_from(&store.inner, PlatformConfig::default(), clock)
            .await
            .unwrap();
        assert_eq!(restored.get_account_balance(&account("bob")), Amount::ZERO);
        assert!(restored.get_task(task.id).await.unwrap().bounty_pending());

        restored.distribute_bounty(&account("alice"), task.id).await.unwrap();
        assert_eq!(restored.get_account_balance(&account("bob")), Amount::new(500));
        let err = restored.distribute_bounty(&account("alice"), task.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDistributed);
    }
}
