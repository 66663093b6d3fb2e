// In-memory user state, seeded from disk at startup and written through on
// every change.
//
// Each user's record sits behind its own async mutex, so the periodic sweep
// and live member/presence events can't interleave a read-modify-write on the
// same user, while different users proceed in parallel.

use super::user_models::{ObservedMember, UserChange, UserRecord};
use crate::core::archive::ArchiveError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One entry from a full load. Corrupt files come back as `Err` so the
/// caller can skip them without failing the whole load.
pub type LoadedRecord = Result<(String, UserRecord), ArchiveError>;

/// Durable storage for user records (port).
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<LoadedRecord>, ArchiveError>;
    async fn save(&self, user_id: &str, record: &UserRecord) -> Result<(), ArchiveError>;
}

/// Totals from one sweep over a member list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub observed: usize,
    pub changed: usize,
    pub failed: usize,
}

pub struct UserStateStore<S: UserRecordStore> {
    store: S,
    records: DashMap<String, Arc<Mutex<UserRecord>>>,
}

impl<S: UserRecordStore> UserStateStore<S> {
    /// Read every persisted record. Unreadable records are skipped with a
    /// warning; the user is treated as new the next time they're seen.
    pub async fn load(store: S) -> Result<Self, ArchiveError> {
        let records = DashMap::new();
        let mut skipped = 0usize;

        for loaded in store.load_all().await? {
            match loaded {
                Ok((user_id, record)) => {
                    records.insert(user_id, Arc::new(Mutex::new(record)));
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping user record: {}", e);
                }
            }
        }

        tracing::info!(loaded = records.len(), skipped, "Loaded user records");
        Ok(Self { store, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub async fn get(&self, user_id: u64) -> Option<UserRecord> {
        let record = self
            .records
            .get(&user_id.to_string())
            .map(|r| Arc::clone(r.value()))?;
        let record = record.lock().await;
        Some(record.clone())
    }

    /// Diff the observation against the stored record, apply it and persist.
    ///
    /// The record is always written back, changed or not. If the write fails
    /// the in-memory record is left as it was so the next event retries.
    pub async fn upsert(&self, observed: &ObservedMember) -> Result<Vec<UserChange>, ArchiveError> {
        let user_id = observed.user_id.to_string();
        let slot = self
            .records
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(UserRecord::default())))
            .value()
            .clone();

        let mut current = slot.lock().await;
        let mut updated = current.clone();
        let changes = updated.observe(observed);

        self.store.save(&user_id, &updated).await?;
        *current = updated;

        Ok(changes)
    }

    /// Upsert every member. One failing user never stops the rest.
    pub async fn snapshot_all(&self, members: Vec<ObservedMember>) -> SweepReport {
        let mut report = SweepReport::default();

        for member in members {
            report.observed += 1;
            match self.upsert(&member).await {
                Ok(changes) => {
                    if !changes.is_empty() {
                        report.changed += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        user_id = member.user_id,
                        scope = %member.scope,
                        "Failed to persist user snapshot: {}",
                        e
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// In-memory store for testing. Saves for users in `fail_for` error out.
    #[derive(Default)]
    struct MockUserStore {
        saved: StdMutex<HashMap<String, UserRecord>>,
        preload: StdMutex<Vec<LoadedRecord>>,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl UserRecordStore for MockUserStore {
        async fn load_all(&self) -> Result<Vec<LoadedRecord>, ArchiveError> {
            Ok(std::mem::take(&mut *self.preload.lock().unwrap()))
        }

        async fn save(&self, user_id: &str, record: &UserRecord) -> Result<(), ArchiveError> {
            if self.fail_for.iter().any(|id| id == user_id) {
                return Err(ArchiveError::WriteFailure {
                    path: format!("{}.json", user_id).into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.saved
                .lock()
                .unwrap()
                .insert(user_id.to_string(), record.clone());
            Ok(())
        }
    }

    fn observed(user_id: u64, nickname: &str) -> ObservedMember {
        ObservedMember::new(user_id, "Guild1", format!("user{}", user_id))
            .with_nickname(Some(nickname.to_string()))
    }

    #[tokio::test]
    async fn nickname_change_is_persisted_with_history() {
        let users = UserStateStore::load(MockUserStore::default()).await.unwrap();
        assert!(users.is_empty());

        users.upsert(&observed(1, "Al")).await.unwrap();
        users.upsert(&observed(1, "Alex")).await.unwrap();

        let saved = users.store.saved.lock().unwrap();
        let profile = &saved["1"].guilds["Guild1"];
        assert_eq!(profile.nickname.as_deref(), Some("Alex"));
        assert_eq!(profile.nicknames, vec!["Al"]);
    }

    #[tokio::test]
    async fn unchanged_upsert_still_writes_through() {
        let users = UserStateStore::load(MockUserStore::default()).await.unwrap();

        users.upsert(&observed(1, "Al")).await.unwrap();
        users.store.saved.lock().unwrap().clear();
        let changes = users.upsert(&observed(1, "Al")).await.unwrap();

        assert!(changes.is_empty());
        assert!(users.store.saved.lock().unwrap().contains_key("1"));
    }

    #[tokio::test]
    async fn load_skips_corrupt_records() {
        let store = MockUserStore::default();
        *store.preload.lock().unwrap() = vec![
            Ok((
                "1".to_string(),
                UserRecord {
                    name: "one".to_string(),
                    ..Default::default()
                },
            )),
            Err(ArchiveError::RecordCorrupt {
                user_id: "2".to_string(),
                reason: "expected value at line 1".to_string(),
            }),
        ];

        let users = UserStateStore::load(store).await.unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users.get(1).await.unwrap().name, "one");
        assert!(users.get(2).await.is_none());
    }

    #[tokio::test]
    async fn failed_persist_does_not_block_the_sweep() {
        let store = MockUserStore {
            fail_for: vec!["2".to_string()],
            ..Default::default()
        };
        let users = UserStateStore::load(store).await.unwrap();

        let report = users
            .snapshot_all(vec![observed(1, "a"), observed(2, "b"), observed(3, "c")])
            .await;

        assert_eq!(
            report,
            SweepReport {
                observed: 3,
                changed: 2,
                failed: 1,
            }
        );
        let saved = users.store.saved.lock().unwrap();
        assert!(saved.contains_key("1"));
        assert!(!saved.contains_key("2"));
        assert!(saved.contains_key("3"));
    }

    #[tokio::test]
    async fn failed_persist_leaves_memory_untouched() {
        let store = MockUserStore {
            fail_for: vec!["2".to_string()],
            ..Default::default()
        };
        let users = UserStateStore::load(store).await.unwrap();

        assert!(users.upsert(&observed(2, "b")).await.is_err());

        assert_eq!(users.get(2).await.unwrap(), UserRecord::default());
    }

    #[tokio::test]
    async fn concurrent_upserts_on_one_user_lose_nothing() {
        let users = Arc::new(UserStateStore::load(MockUserStore::default()).await.unwrap());
        users.upsert(&observed(1, "start")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let users = Arc::clone(&users);
            handles.push(tokio::spawn(async move {
                users.upsert(&observed(1, &format!("n{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every nickname change moved exactly one value into the history.
        let record = users.get(1).await.unwrap();
        assert_eq!(record.guilds["Guild1"].nicknames.len(), 20);
    }
}
