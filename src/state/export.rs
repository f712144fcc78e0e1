//! State export/import and snapshot files.
//!
//! A snapshot holds every persistent table. Runtime-only parts are left out:
//! - the music provider (rebuilt from config)
//! - scheduler tasks (restored from `Round::advance_interval_secs`)
//! - account provider tokens (never serialized)

use super::{AppState, Store};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Schema version for export format compatibility
/// Version 2: added accounts and pending_actions
pub const EXPORT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    /// Export timestamp (ISO8601)
    pub exported_at: String,
    pub rounds: HashMap<RoundId, Round>,
    pub submissions: HashMap<SubmissionId, Submission>,
    pub guesses: HashMap<GuessId, Guess>,
    #[serde(default)]
    pub accounts: HashMap<AccountId, Account>,
    #[serde(default)]
    pub pending_actions: HashMap<PendingActionId, PendingAction>,
    pub next_seq: u64,
}

impl StoreSnapshot {
    pub fn from_store(store: &Store) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            rounds: store.rounds.clone(),
            submissions: store.submissions.clone(),
            guesses: store.guesses.clone(),
            accounts: store.accounts.clone(),
            pending_actions: store.pending_actions.clone(),
            next_seq: store.next_seq,
        }
    }

    pub fn into_store(self) -> Store {
        Store {
            rounds: self.rounds,
            submissions: self.submissions,
            guesses: self.guesses,
            accounts: self.accounts,
            pending_actions: self.pending_actions,
            next_seq: self.next_seq,
        }
    }

    /// Validate the snapshot before import
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Export schema version {} is newer than supported version {}. \
                 Please update the server.",
                self.schema_version, EXPORT_SCHEMA_VERSION
            ));
        }

        let mut long_ids = HashSet::new();
        for round in self.rounds.values() {
            if !long_ids.insert(round.long_id.as_str()) {
                return Err(format!("Duplicate round long_id '{}'", round.long_id));
            }
        }

        let mut names = HashSet::new();
        let mut accounts = HashSet::new();
        for (sub_id, sub) in &self.submissions {
            if !self.rounds.contains_key(&sub.round_id) {
                return Err(format!(
                    "Submission '{}' references round '{}' which doesn't exist",
                    sub_id, sub.round_id
                ));
            }
            if !names.insert((sub.round_id.as_str(), sub.display_name.as_str())) {
                return Err(format!(
                    "Round '{}' has two submissions named '{}'",
                    sub.round_id, sub.display_name
                ));
            }
            if let Some(account_id) = &sub.account_id {
                if !self.accounts.contains_key(account_id) {
                    return Err(format!(
                        "Submission '{}' references account '{}' which doesn't exist",
                        sub_id, account_id
                    ));
                }
                if !accounts.insert((sub.round_id.as_str(), account_id.as_str())) {
                    return Err(format!(
                        "Round '{}' has two submissions from account '{}'",
                        sub.round_id, account_id
                    ));
                }
            }
            if sub.seq >= self.next_seq {
                return Err(format!(
                    "Submission '{}' has sequence {} but next_seq is {}",
                    sub_id, sub.seq, self.next_seq
                ));
            }
        }

        for (guess_id, guess) in &self.guesses {
            if !self.submissions.contains_key(&guess.submission_id) {
                return Err(format!(
                    "Guess '{}' references submission '{}' which doesn't exist",
                    guess_id, guess.submission_id
                ));
            }
        }

        for (action_id, action) in &self.pending_actions {
            if !self.rounds.contains_key(&action.round_id) {
                return Err(format!(
                    "Pending action '{}' references round '{}' which doesn't exist",
                    action_id, action.round_id
                ));
            }
            if !self.accounts.contains_key(&action.account_id) {
                return Err(format!(
                    "Pending action '{}' references account '{}' which doesn't exist",
                    action_id, action.account_id
                ));
            }
        }

        Ok(())
    }
}

impl AppState {
    /// Export the entire store
    pub async fn export_state(&self) -> StoreSnapshot {
        StoreSnapshot::from_store(&*self.store.read().await)
    }

    /// Replace the entire store with a validated snapshot
    pub async fn import_state(&self, snapshot: StoreSnapshot) -> Result<(), String> {
        snapshot.validate()?;

        let rounds = snapshot.rounds.len();
        let submissions = snapshot.submissions.len();
        *self.store.write().await = snapshot.into_store();

        tracing::info!(
            "Imported state: {} rounds, {} submissions",
            rounds,
            submissions
        );
        Ok(())
    }

    /// Write a snapshot file, replacing it atomically
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), String> {
        let snapshot = self.export_state().await;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| format!("Failed to write {}: {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| format!("Failed to replace {}: {}", path.display(), e))?;

        tracing::debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Load a snapshot file if it exists. Returns whether one was loaded.
    pub async fn load_snapshot(&self, path: &Path) -> Result<bool, String> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
        };
        let snapshot: StoreSnapshot = serde_json::from_slice(&content)
            .map_err(|e| format!("Invalid snapshot {}: {}", path.display(), e))?;
        self.import_state(snapshot).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn empty_snapshot() -> StoreSnapshot {
        StoreSnapshot::from_store(&Store::default())
    }

    #[test]
    fn test_validation_future_schema() {
        let mut snapshot = empty_snapshot();
        snapshot.schema_version = EXPORT_SCHEMA_VERSION + 1;

        let result = snapshot.validate();
        assert!(result.unwrap_err().contains("newer than supported"));
    }

    #[test]
    fn test_validation_dangling_submission() {
        let mut store = Store::default();
        store
            .insert_submission("missing_round", None, "Alice", "l")
            .unwrap();

        let result = StoreSnapshot::from_store(&store).validate();
        assert!(result.unwrap_err().contains("doesn't exist"));
    }

    #[tokio::test]
    async fn test_validation_dangling_submission_account() {
        let state = state();
        let round = state
            .create_round("r", MusicKind::Track, HouseStrategy::Random)
            .await
            .unwrap();
        state
            .store
            .write()
            .await
            .insert_submission(&round.id, Some("ghost".to_string()), "Alice", "l")
            .unwrap();

        let result = state.export_state().await.validate();
        assert!(result.unwrap_err().contains("account 'ghost'"));
    }

    #[tokio::test]
    async fn test_export_import_keeps_round_and_hides_tokens() {
        let state = state();
        let round = state
            .create_round("r", MusicKind::Track, HouseStrategy::Random)
            .await
            .unwrap();
        state
            .submit_entry(&round.long_id, "Alice", &link(MusicKind::Track, "t2"), None)
            .await
            .unwrap();
        let account = state.login_account("alice", None).await.unwrap();
        state
            .store
            .write()
            .await
            .accounts
            .get_mut(&account.id)
            .unwrap()
            .provider_token = Some("secret".to_string());

        let json = serde_json::to_string(&state.export_state().await).unwrap();
        assert!(!json.contains("secret"));

        let restored = super::super::test_support::state();
        let snapshot: StoreSnapshot = serde_json::from_str(&json).unwrap();
        restored.import_state(snapshot).await.unwrap();

        assert_eq!(
            restored.get_submissions(&round.long_id).await.unwrap().len(),
            1
        );
        // Sequence numbers continue after the imported ones
        let next = restored
            .submit_entry(&round.long_id, "Bob", &link(MusicKind::Track, "t3"), None)
            .await
            .unwrap();
        assert_eq!(next.seq, 1);
    }

    #[tokio::test]
    async fn test_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = state();
        assert!(!state.load_snapshot(&path).await.unwrap());

        let round = state
            .create_round("r", MusicKind::Album, HouseStrategy::Similar)
            .await
            .unwrap();
        state.save_snapshot(&path).await.unwrap();

        let restored = super::super::test_support::state();
        assert!(restored.load_snapshot(&path).await.unwrap());
        assert_eq!(
            restored.get_round(&round.long_id).await.unwrap().id,
            round.id
        );
    }
}
