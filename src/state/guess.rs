use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One line of a guess batch: who the guesser thinks is at `position`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessEntry {
    pub name: String,
    pub position: usize,
}

impl GuessEntry {
    pub fn new(name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessOutcome {
    pub target_display_name: String,
    pub guessed_position: usize,
    pub correct: bool,
}

/// A guesser's score for the reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuesserScore {
    pub guesser: String,
    pub correct: usize,
    pub total: usize,
    pub guesses: Vec<GuessOutcome>,
}

/// Parse `name: position` lines. Blank lines are skipped.
pub fn parse_guess_lines(text: &str) -> RoundResult<Vec<GuessEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let (name, position) = line.rsplit_once(':').ok_or_else(|| {
            RoundError::MalformedGuess(format!("line {}: expected 'name: position'", line_no))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RoundError::MalformedGuess(format!(
                "line {}: missing name",
                line_no
            )));
        }
        let position = position.trim().parse::<usize>().map_err(|_| {
            RoundError::MalformedGuess(format!(
                "line {}: '{}' is not a position number",
                line_no,
                position.trim()
            ))
        })?;
        entries.push(GuessEntry::new(name, position));
    }
    Ok(entries)
}

/// Check that `mapping` pairs every roster name with exactly one distinct
/// position in `0..roster.len()`
fn validate_bijection(roster: &[&str], mapping: &[GuessEntry]) -> RoundResult<()> {
    let n = roster.len();
    let mut names = HashSet::new();
    let mut positions = HashSet::new();

    for entry in mapping {
        if !roster.contains(&entry.name.as_str()) {
            return Err(RoundError::MalformedGuess(format!(
                "'{}' is not in this round",
                entry.name
            )));
        }
        if !names.insert(entry.name.as_str()) {
            return Err(RoundError::MalformedGuess(format!(
                "'{}' is guessed more than once",
                entry.name
            )));
        }
        if entry.position >= n {
            return Err(RoundError::MalformedGuess(format!(
                "position {} for '{}' is out of range (0-{})",
                entry.position,
                entry.name,
                n.saturating_sub(1)
            )));
        }
        if !positions.insert(entry.position) {
            return Err(RoundError::MalformedGuess(format!(
                "position {} is used more than once",
                entry.position
            )));
        }
    }

    if let Some(missing) = roster.iter().find(|name| !names.contains(*name)) {
        return Err(RoundError::MalformedGuess(format!(
            "'{}' is missing",
            missing
        )));
    }
    Ok(())
}

impl AppState {
    /// Record a complete guess batch for one roster member
    pub async fn submit_guess(
        &self,
        long_id: &str,
        guesser: &str,
        mapping: &[GuessEntry],
    ) -> RoundResult<Vec<Guess>> {
        let round = self.get_round(long_id).await?;
        if round.phase != RoundPhase::Listen {
            return Err(RoundError::WrongPhase {
                expected: RoundPhase::Listen,
                actual: round.phase,
            });
        }
        self.ensure_shuffled(long_id).await?;

        let mut store = self.store.write().await;
        let phase = store
            .rounds
            .get(&round.id)
            .map(|r| r.phase)
            .ok_or(RoundError::RoundNotFound)?;
        if phase != RoundPhase::Listen {
            return Err(RoundError::WrongPhase {
                expected: RoundPhase::Listen,
                actual: phase,
            });
        }

        let guesser = guesser.trim();
        let guesser_id = store
            .submission_by_name(&round.id, guesser)
            .filter(|s| !s.is_house())
            .map(|s| s.id.clone())
            .ok_or_else(|| RoundError::UnknownGuesser(guesser.to_string()))?;
        if store.guesses.values().any(|g| g.submission_id == guesser_id) {
            return Err(RoundError::AlreadyGuessed(guesser.to_string()));
        }

        let guesses: Vec<Guess> = {
            let subs = store.round_submissions(&round.id);
            let roster: Vec<&str> = subs.iter().map(|s| s.display_name.as_str()).collect();
            validate_bijection(&roster, mapping)?;

            let true_positions: HashMap<&str, Option<usize>> = subs
                .iter()
                .map(|s| (s.display_name.as_str(), s.shuffle_position))
                .collect();
            mapping
                .iter()
                .map(|entry| Guess {
                    id: ulid::Ulid::new().to_string(),
                    submission_id: guesser_id.clone(),
                    target_display_name: entry.name.clone(),
                    guessed_position: entry.position,
                    correct: true_positions.get(entry.name.as_str()).copied().flatten()
                        == Some(entry.position),
                })
                .collect()
        };

        for guess in &guesses {
            store.guesses.insert(guess.id.clone(), guess.clone());
        }

        tracing::info!(
            "'{}' guessed in round {} ({} of {} correct)",
            guesser,
            long_id,
            guesses.iter().filter(|g| g.correct).count(),
            guesses.len()
        );
        Ok(guesses)
    }

    /// Per-guesser scores, best first
    pub async fn guess_results(&self, long_id: &str) -> RoundResult<Vec<GuesserScore>> {
        let store = self.store.read().await;
        let round = store
            .round_by_long_id(long_id)
            .ok_or(RoundError::RoundNotFound)?;

        let mut by_guesser: HashMap<&str, Vec<&Guess>> = HashMap::new();
        for guess in store.round_guesses(&round.id) {
            if let Some(sub) = store.submissions.get(&guess.submission_id) {
                by_guesser
                    .entry(sub.display_name.as_str())
                    .or_default()
                    .push(guess);
            }
        }

        let mut scores: Vec<GuesserScore> = by_guesser
            .into_iter()
            .map(|(guesser, mut guesses)| {
                guesses.sort_by_key(|g| g.guessed_position);
                GuesserScore {
                    guesser: guesser.to_string(),
                    correct: guesses.iter().filter(|g| g.correct).count(),
                    total: guesses.len(),
                    guesses: guesses
                        .into_iter()
                        .map(|g| GuessOutcome {
                            target_display_name: g.target_display_name.clone(),
                            guessed_position: g.guessed_position,
                            correct: g.correct,
                        })
                        .collect(),
                }
            })
            .collect();
        scores.sort_by(|a, b| b.correct.cmp(&a.correct).then_with(|| a.guesser.cmp(&b.guesser)));
        Ok(scores)
    }
}
