use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::music::MusicError;
use crate::types::*;

/// Trim and validate a participant name
fn validate_display_name(display_name: &str) -> RoundResult<String> {
    let name = display_name.trim();
    if name == HOUSE_NAME {
        return Err(RoundError::ReservedName(HOUSE_NAME.to_string()));
    }
    if name.is_empty() {
        return Err(RoundError::InvalidName("name can't be blank".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(RoundError::InvalidName(format!(
            "name can't be longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

impl AppState {
    /// Submit music to a round, or edit the submission the account already
    /// has in it
    pub async fn submit_entry(
        &self,
        long_id: &str,
        display_name: &str,
        link: &str,
        account_id: Option<&str>,
    ) -> RoundResult<Submission> {
        let name = validate_display_name(display_name)?;
        let link = link.trim();
        if let Some(account_id) = account_id {
            self.get_account(account_id).await?;
        }

        let round_id = self.get_round(long_id).await?.id;
        let _guard = self.lock_round(&round_id).await;

        let round = self.get_round(long_id).await?;
        if round.phase != RoundPhase::Submit {
            return Err(RoundError::WrongPhase {
                expected: RoundPhase::Submit,
                actual: round.phase,
            });
        }

        let kind = round.music_kind;
        if link.is_empty() || link.len() > MAX_LINK_LENGTH {
            return Err(RoundError::InvalidLink { kind });
        }
        match self.call_provider(self.provider.resolve(kind, link)).await {
            Ok(_) => {}
            Err(MusicError::InvalidLink(_)) | Err(MusicError::NotFound(_)) => {
                return Err(RoundError::InvalidLink { kind })
            }
            Err(e) => return Err(e.into()),
        }

        let mut store = self.store.write().await;
        let existing = account_id
            .and_then(|account_id| store.submission_by_account(&round.id, account_id))
            .map(|s| s.id.clone());

        let Some(submission_id) = existing else {
            let submission =
                store.insert_submission(&round.id, account_id.map(String::from), &name, link)?;
            tracing::info!("New submission '{}' in round {}", name, long_id);
            return Ok(submission);
        };

        // Edited names still have to be unique within the round
        if store
            .submission_by_name(&round.id, &name)
            .is_some_and(|s| s.id != submission_id)
        {
            return Err(RoundError::DuplicateName(name));
        }
        let submission = store
            .submissions
            .get_mut(&submission_id)
            .ok_or_else(|| RoundError::Internal(format!("submission {} vanished", submission_id)))?;
        submission.display_name = name;
        submission.link = link.to_string();
        tracing::info!(
            "Edited submission '{}' in round {}",
            submission.display_name,
            long_id
        );
        Ok(submission.clone())
    }

    /// Submissions of a round in insertion order
    pub async fn get_submissions(&self, long_id: &str) -> RoundResult<Vec<Submission>> {
        let store = self.store.read().await;
        let round = store
            .round_by_long_id(long_id)
            .ok_or(RoundError::RoundNotFound)?;
        Ok(store
            .round_submissions(&round.id)
            .into_iter()
            .cloned()
            .collect())
    }
}
