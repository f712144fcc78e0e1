use super::guess::GuesserScore;
use super::id::generate_long_id;
use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::types::*;
use serde::Serialize;

/// What an `advance` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced { from: RoundPhase, to: RoundPhase },
    /// The round was not in the phase preceding the target
    Unchanged { phase: RoundPhase },
}

impl AdvanceOutcome {
    pub fn advanced(&self) -> bool {
        matches!(self, AdvanceOutcome::Advanced { .. })
    }

    /// Phase of the round after the call
    pub fn phase(&self) -> RoundPhase {
        match self {
            AdvanceOutcome::Advanced { to, .. } => *to,
            AdvanceOutcome::Unchanged { phase } => *phase,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnSubmission {
    pub display_name: String,
    pub link: String,
}

/// One shuffled entry. The name is hidden until the reveal.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub position: usize,
    pub display_name: Option<String>,
    pub item: MusicItem,
}

/// Phase-dependent projection of a round
#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub long_id: LongId,
    pub description: String,
    pub music_kind: MusicKind,
    pub house_strategy: HouseStrategy,
    pub phase: RoundPhase,
    pub submission_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_submission: Option<OwnSubmission>,
    /// Everyone who can be guessed, sorted by name (listen/revealed)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roster: Vec<RosterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_search_term: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<GuesserScore>,
}

impl AppState {
    /// Create a round in the submit phase
    pub async fn create_round(
        &self,
        description: &str,
        music_kind: MusicKind,
        house_strategy: HouseStrategy,
    ) -> RoundResult<Round> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RoundError::InvalidDescription);
        }

        let mut store = self.store.write().await;
        let long_id = loop {
            let candidate = self.with_rng(|rng| generate_long_id(rng));
            if store.round_by_long_id(&candidate).is_none() {
                break candidate;
            }
        };

        let round = Round {
            id: ulid::Ulid::new().to_string(),
            long_id,
            description: description.to_string(),
            music_kind,
            house_strategy,
            phase: RoundPhase::Submit,
            house_search_term: None,
            playlist_link: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            advance_interval_secs: None,
        };
        store.rounds.insert(round.id.clone(), round.clone());

        tracing::info!(
            "Created {} round {} ({:?} house rec)",
            music_kind,
            round.long_id,
            house_strategy
        );
        Ok(round)
    }

    /// Move a round to `target` if it is exactly one phase behind it.
    /// Any other call leaves the round untouched.
    pub async fn advance(&self, long_id: &str, target: RoundPhase) -> RoundResult<AdvanceOutcome> {
        let round_id = self.get_round(long_id).await?.id;
        let _guard = self.lock_round(&round_id).await;

        // Re-read under the round lock
        let round = self.get_round(long_id).await?;
        let from = round.phase;
        if from.next() != Some(target) {
            tracing::debug!(
                "Ignoring advance of round {} to {} (currently {})",
                long_id,
                target,
                from
            );
            return Ok(AdvanceOutcome::Unchanged { phase: from });
        }

        match target {
            RoundPhase::Listen => {
                let rec = self.generate_house_rec(&round).await?;

                let mut store = self.store.write().await;
                store.insert_submission(&round.id, None, HOUSE_NAME, &rec.link)?;
                let stored = store
                    .rounds
                    .get_mut(&round.id)
                    .ok_or(RoundError::RoundNotFound)?;
                if round.house_strategy == HouseStrategy::Random {
                    stored.house_search_term = rec.search_term.clone();
                }
                stored.phase = RoundPhase::Listen;
                tracing::info!("House rec for round {}: {}", long_id, rec);
            }
            RoundPhase::Revealed => {
                let mut store = self.store.write().await;
                let stored = store
                    .rounds
                    .get_mut(&round.id)
                    .ok_or(RoundError::RoundNotFound)?;
                stored.phase = RoundPhase::Revealed;
            }
            RoundPhase::Submit => {
                return Err(RoundError::Internal(
                    "no phase advances into submit".to_string(),
                ))
            }
        }

        tracing::info!("Round {} advanced {} -> {}", long_id, from, target);
        Ok(AdvanceOutcome::Advanced { from, to: target })
    }

    /// Build the view of a round. A viewing account sees its own entry
    /// only while submissions are open.
    pub async fn get_view(&self, long_id: &str, account_id: Option<&str>) -> RoundResult<RoundView> {
        let round = self.get_round(long_id).await?;

        let (submission_count, own_submission) = {
            let store = self.store.read().await;
            let own = account_id
                .filter(|_| round.phase == RoundPhase::Submit)
                .and_then(|account_id| store.submission_by_account(&round.id, account_id))
                .map(|s| OwnSubmission {
                    display_name: s.display_name.clone(),
                    link: s.link.clone(),
                });
            (store.round_submissions(&round.id).len(), own)
        };

        let mut view = RoundView {
            long_id: round.long_id.clone(),
            description: round.description.clone(),
            music_kind: round.music_kind,
            house_strategy: round.house_strategy,
            phase: round.phase,
            submission_count,
            own_submission,
            participants: Vec::new(),
            roster: Vec::new(),
            playlist_link: None,
            house_search_term: None,
            results: Vec::new(),
        };

        if round.phase == RoundPhase::Submit {
            return Ok(view);
        }

        let revealed = round.phase == RoundPhase::Revealed;
        let roster = self.get_ordered_roster(long_id).await?;
        let mut participants: Vec<String> = roster.iter().map(|(name, _)| name.clone()).collect();
        participants.sort();

        view.participants = participants;
        view.roster = roster
            .into_iter()
            .enumerate()
            .map(|(position, (name, item))| RosterEntry {
                position,
                display_name: revealed.then_some(name),
                item,
            })
            .collect();
        view.playlist_link = round.playlist_link.clone();

        if revealed {
            view.house_search_term = round.house_search_term.clone();
            view.results = self.guess_results(long_id).await?;
        }
        Ok(view)
    }
}
