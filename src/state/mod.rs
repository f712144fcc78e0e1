mod account;
mod export;
mod guess;
mod house;
mod id;
mod playlist;
mod round;
mod shuffle;
mod submission;

pub use export::{StoreSnapshot, EXPORT_SCHEMA_VERSION};
pub use guess::{parse_guess_lines, GuessEntry, GuessOutcome, GuesserScore};
pub use playlist::ResumedAction;
pub use round::{AdvanceOutcome, OwnSubmission, RosterEntry, RoundView};

use crate::config::AppConfig;
use crate::error::{RoundError, RoundResult};
use crate::music::{MusicError, MusicProvider, MusicResult};
use crate::scheduler::JobTable;
use crate::types::*;
use crate::words::Words;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// All persistent tables. Every operation mutates it under one write guard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    pub rounds: HashMap<RoundId, Round>,
    pub submissions: HashMap<SubmissionId, Submission>,
    pub guesses: HashMap<GuessId, Guess>,
    pub accounts: HashMap<AccountId, Account>,
    pub pending_actions: HashMap<PendingActionId, PendingAction>,
    /// Next submission sequence number
    pub next_seq: u64,
}

impl Store {
    pub fn round_by_long_id(&self, long_id: &str) -> Option<&Round> {
        self.rounds.values().find(|r| r.long_id == long_id)
    }

    /// Submissions of a round in insertion order
    pub fn round_submissions(&self, round_id: &str) -> Vec<&Submission> {
        let mut subs: Vec<&Submission> = self
            .submissions
            .values()
            .filter(|s| s.round_id == round_id)
            .collect();
        subs.sort_by_key(|s| s.seq);
        subs
    }

    pub fn submission_by_name(&self, round_id: &str, display_name: &str) -> Option<&Submission> {
        self.submissions
            .values()
            .find(|s| s.round_id == round_id && s.display_name == display_name)
    }

    pub fn submission_by_account(&self, round_id: &str, account_id: &str) -> Option<&Submission> {
        self.submissions
            .values()
            .find(|s| s.round_id == round_id && s.account_id.as_deref() == Some(account_id))
    }

    /// Guesses made by members of a round
    pub fn round_guesses(&self, round_id: &str) -> Vec<&Guess> {
        self.guesses
            .values()
            .filter(|g| {
                self.submissions
                    .get(&g.submission_id)
                    .is_some_and(|s| s.round_id == round_id)
            })
            .collect()
    }

    /// Insert a new submission row, enforcing the per-round uniqueness of
    /// display names and accounts
    pub fn insert_submission(
        &mut self,
        round_id: &str,
        account_id: Option<AccountId>,
        display_name: &str,
        link: &str,
    ) -> RoundResult<Submission> {
        if self.submission_by_name(round_id, display_name).is_some() {
            return Err(RoundError::DuplicateName(display_name.to_string()));
        }
        if let Some(account_id) = &account_id {
            if self.submission_by_account(round_id, account_id).is_some() {
                return Err(RoundError::DuplicateAccountSubmission);
            }
        }

        let submission = Submission {
            id: ulid::Ulid::new().to_string(),
            round_id: round_id.to_string(),
            account_id,
            display_name: display_name.to_string(),
            link: link.to_string(),
            shuffle_position: None,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.submissions
            .insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub provider: Arc<dyn MusicProvider>,
    pub config: AppConfig,
    pub words: Arc<Words>,
    rng: Arc<std::sync::Mutex<StdRng>>,
    /// Serializes submit/advance/playlist work per round
    round_locks: Arc<std::sync::Mutex<HashMap<RoundId, Arc<Mutex<()>>>>>,
    pub(crate) jobs: Arc<std::sync::Mutex<JobTable>>,
}

impl AppState {
    pub fn new(provider: Arc<dyn MusicProvider>) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            provider,
            config: AppConfig::default(),
            words: Arc::new(Words::default()),
            rng: Arc::new(std::sync::Mutex::new(StdRng::from_os_rng())),
            round_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
            jobs: Arc::new(std::sync::Mutex::new(JobTable::default())),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_words(mut self, words: Words) -> Self {
        self.words = Arc::new(words);
        self
    }

    /// Use a deterministic random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(std::sync::Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// Run `f` with exclusive access to the random source
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Acquire the per-round lock. Locks nobody holds or waits on are
    /// dropped from the table on the way.
    pub(crate) async fn lock_round(&self, round_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.round_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(round_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Run a provider call bounded by the configured timeout
    pub(crate) async fn call_provider<T>(
        &self,
        call: impl Future<Output = MusicResult<T>>,
    ) -> MusicResult<T> {
        let limit = self.config.provider_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| MusicError::Timeout(limit))?
    }

    /// Look up a round by its public identifier
    pub async fn get_round(&self, long_id: &str) -> RoundResult<Round> {
        self.store
            .read()
            .await
            .round_by_long_id(long_id)
            .cloned()
            .ok_or(RoundError::RoundNotFound)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::music::{CatalogEntry, CatalogProvider};

    pub fn track(id: &str, title: &str, artist: &str, popularity: u32) -> CatalogEntry {
        entry(MusicKind::Track, id, title, artist, popularity)
    }

    pub fn album(id: &str, title: &str, artist: &str, popularity: u32) -> CatalogEntry {
        entry(MusicKind::Album, id, title, artist, popularity)
    }

    fn entry(kind: MusicKind, id: &str, title: &str, artist: &str, popularity: u32) -> CatalogEntry {
        CatalogEntry {
            kind,
            popularity,
            item: MusicItem {
                link: link(kind, id),
                title: title.to_string(),
                artists: vec![artist.to_string()],
                artwork_url: None,
                artist_ids: vec![artist.to_lowercase()],
                search_term: None,
            },
        }
    }

    pub fn link(kind: MusicKind, id: &str) -> String {
        format!("https://open.spotify.com/{}/{}", kind.as_str(), id)
    }

    pub fn catalog() -> CatalogProvider {
        CatalogProvider::new(vec![
            track("t1", "Moon River", "Audrey", 80),
            track("t2", "Harvest Moon", "Neil", 75),
            track("t3", "Sunrise", "Norah", 60),
            track("t4", "River Deep", "Ike", 40),
            album("a1", "Moon Safari", "Air", 70),
            album("a2", "Blue Train", "Coltrane", 65),
            album("a3", "Kind of Blue", "Miles", 90),
        ])
    }

    /// State over the test catalog whose word list only hits catalog items
    pub fn state() -> AppState {
        AppState::new(Arc::new(catalog()))
            .with_words(Words::new(vec!["moon".to_string()]))
            .with_seed(42)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_insert_submission_enforces_uniqueness() {
        let mut store = Store::default();
        let first = store
            .insert_submission("r1", Some("acc".to_string()), "Alice", "l1")
            .unwrap();
        assert_eq!(first.seq, 0);

        let by_name = store.insert_submission("r1", None, "Alice", "l2");
        assert!(matches!(by_name, Err(RoundError::DuplicateName(n)) if n == "Alice"));

        let by_account = store.insert_submission("r1", Some("acc".to_string()), "Bob", "l2");
        assert!(matches!(by_account, Err(RoundError::DuplicateAccountSubmission)));

        // Same name in another round is fine
        let other = store.insert_submission("r2", None, "Alice", "l3").unwrap();
        assert_eq!(other.seq, 1);
        assert_eq!(store.round_submissions("r1").len(), 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut store = Store::default();
        store.insert_submission("r1", None, "alice", "l1").unwrap();
        assert!(store.insert_submission("r1", None, "Alice", "l2").is_ok());
    }

    #[tokio::test]
    async fn test_get_round_not_found() {
        let state = state();
        assert!(matches!(
            state.get_round("missing").await,
            Err(RoundError::RoundNotFound)
        ));
    }

    #[tokio::test]
    async fn test_idle_round_locks_are_dropped() {
        let state = state();
        let first = state.lock_round("r1").await;
        drop(state.lock_round("r2").await);

        // r2 is idle and goes, r1 is still held
        let _third = state.lock_round("r3").await;
        {
            let locks = state.round_locks.lock().unwrap();
            assert!(locks.contains_key("r1"));
            assert!(!locks.contains_key("r2"));
        }

        drop(first);
        drop(state.lock_round("r4").await);
        let locks = state.round_locks.lock().unwrap();
        assert!(!locks.contains_key("r1"));
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_provider_times_out() {
        let state = state();
        let slow = async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<_, MusicError>(())
        };
        assert!(matches!(
            state.call_provider(slow).await,
            Err(MusicError::Timeout(_))
        ));
    }
}
