use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::music::MusicError;
use crate::types::*;
use serde::Serialize;

/// Result of replaying a pending action after external auth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumedAction {
    PlaylistCreated { long_id: LongId, link: String },
}

fn validate_playlist_name(name: &str) -> RoundResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoundError::InvalidPlaylistName(
            "name can't be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_PLAYLIST_NAME_LENGTH {
        return Err(RoundError::InvalidPlaylistName(format!(
            "name can't be longer than {} characters",
            MAX_PLAYLIST_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

impl AppState {
    /// Create a playlist of the round's tracks in shuffled order on behalf of
    /// an account. Without a provider token the request is parked as a
    /// pending action and `AuthRequired` is returned.
    pub async fn create_playlist(
        &self,
        long_id: &str,
        account_id: &str,
        name: &str,
    ) -> RoundResult<String> {
        let name = validate_playlist_name(name)?;
        let round = self.get_round(long_id).await?;
        check_playlist_allowed(&round)?;

        let account = self.get_account(account_id).await?;
        let Some(token) = account.provider_token else {
            return Err(self.park_playlist(&round, account_id, name).await);
        };

        let _guard = self.lock_round(&round.id).await;
        let round = self.get_round(long_id).await?;
        check_playlist_allowed(&round)?;

        let items: Vec<MusicItem> = self
            .get_ordered_roster(long_id)
            .await?
            .into_iter()
            .map(|(_, item)| item)
            .collect();

        let link = match self
            .call_provider(self.provider.create_playlist(&token, &name, &items))
            .await
        {
            Ok(link) => link,
            Err(MusicError::Unauthorized) => {
                tracing::info!("Provider token of account {} was rejected", account_id);
                self.clear_provider_token(account_id).await;
                return Err(self.park_playlist(&round, account_id, name).await);
            }
            Err(e) => return Err(e.into()),
        };

        let mut store = self.store.write().await;
        let stored = store
            .rounds
            .get_mut(&round.id)
            .ok_or(RoundError::RoundNotFound)?;
        stored.playlist_link = Some(link.clone());
        tracing::info!("Created playlist '{}' for round {}: {}", name, long_id, link);
        Ok(link)
    }

    /// Store the token from a finished external auth and replay the action
    /// that was waiting for it
    pub async fn complete_external_auth(
        &self,
        action_id: &str,
        provider_token: &str,
    ) -> RoundResult<ResumedAction> {
        let (action, long_id) = {
            let mut store = self.store.write().await;
            let action = store
                .pending_actions
                .remove(action_id)
                .ok_or(RoundError::PendingActionNotFound)?;
            let account = store
                .accounts
                .get_mut(&action.account_id)
                .ok_or(RoundError::AccountNotFound)?;
            account.provider_token = Some(provider_token.to_string());
            let long_id = store
                .rounds
                .get(&action.round_id)
                .map(|r| r.long_id.clone())
                .ok_or(RoundError::RoundNotFound)?;
            (action, long_id)
        };

        tracing::info!("Resuming pending action {}", action.id);
        match action.action {
            PendingActionKind::CreatePlaylist { name } => {
                let link = self
                    .create_playlist(&long_id, &action.account_id, &name)
                    .await?;
                Ok(ResumedAction::PlaylistCreated { long_id, link })
            }
        }
    }

    /// Persist a playlist request until the account authorizes
    async fn park_playlist(&self, round: &Round, account_id: &str, name: String) -> RoundError {
        let action = PendingAction {
            id: ulid::Ulid::new().to_string(),
            account_id: account_id.to_string(),
            round_id: round.id.clone(),
            action: PendingActionKind::CreatePlaylist { name },
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let action_id = action.id.clone();
        self.store
            .write()
            .await
            .pending_actions
            .insert(action.id.clone(), action);
        tracing::info!(
            "Playlist for round {} waits on auth (action {})",
            round.long_id,
            action_id
        );
        RoundError::AuthRequired { action_id }
    }

    async fn clear_provider_token(&self, account_id: &str) {
        if let Some(account) = self.store.write().await.accounts.get_mut(account_id) {
            account.provider_token = None;
        }
    }
}

fn check_playlist_allowed(round: &Round) -> RoundResult<()> {
    if round.music_kind != MusicKind::Track {
        return Err(RoundError::PlaylistUnsupported);
    }
    if round.phase == RoundPhase::Submit {
        return Err(RoundError::WrongPhase {
            expected: RoundPhase::Listen,
            actual: round.phase,
        });
    }
    if round.playlist_link.is_some() {
        return Err(RoundError::PlaylistExists);
    }
    Ok(())
}
