use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::types::*;
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use rand::Rng;

/// Uniform random permutation of `0..n`
fn random_permutation<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..n).collect();
    positions.shuffle(rng);
    positions
}

/// Order submissions by shuffle position, checking the positions are a
/// dense permutation
fn order_by_position(subs: Vec<Submission>) -> RoundResult<Vec<Submission>> {
    let n = subs.len();
    let mut slots: Vec<Option<Submission>> = vec![None; n];
    for sub in subs {
        let position = sub
            .shuffle_position
            .ok_or_else(|| RoundError::Internal(format!("submission {} is unshuffled", sub.id)))?;
        match slots.get_mut(position) {
            Some(slot) if slot.is_none() => *slot = Some(sub),
            _ => {
                return Err(RoundError::Internal(format!(
                    "shuffle position {} is out of range or taken ({} submissions)",
                    position, n
                )))
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

impl AppState {
    /// Assign shuffle positions to a round's submissions unless they already
    /// have them. Runs at most once per round.
    pub async fn ensure_shuffled(&self, long_id: &str) -> RoundResult<()> {
        let mut store = self.store.write().await;
        let round = store
            .round_by_long_id(long_id)
            .cloned()
            .ok_or(RoundError::RoundNotFound)?;
        if round.phase == RoundPhase::Submit {
            return Err(RoundError::WrongPhase {
                expected: RoundPhase::Listen,
                actual: round.phase,
            });
        }

        let ids: Vec<SubmissionId> = store
            .round_submissions(&round.id)
            .iter()
            .map(|s| s.id.clone())
            .collect();
        let positioned = store
            .round_submissions(&round.id)
            .iter()
            .filter(|s| s.shuffle_position.is_some())
            .count();

        if positioned == ids.len() {
            return Ok(());
        }
        if positioned > 0 {
            tracing::error!(
                "Round {} is partially shuffled ({} of {})",
                long_id,
                positioned,
                ids.len()
            );
            return Err(RoundError::Internal(format!(
                "round {} is partially shuffled",
                round.id
            )));
        }

        let positions = self.with_rng(|rng| random_permutation(rng, ids.len()));
        for (id, position) in ids.iter().zip(positions) {
            if let Some(sub) = store.submissions.get_mut(id) {
                sub.shuffle_position = Some(position);
            }
        }
        tracing::info!("Shuffled {} submissions of round {}", ids.len(), long_id);
        Ok(())
    }

    /// Names paired with their resolved music, in shuffle order
    pub async fn get_ordered_roster(&self, long_id: &str) -> RoundResult<Vec<(String, MusicItem)>> {
        self.ensure_shuffled(long_id).await?;

        let round = self.get_round(long_id).await?;
        let ordered = order_by_position(self.get_submissions(long_id).await?)?;

        let items = try_join_all(ordered.iter().map(|sub| {
            self.call_provider(self.provider.resolve(round.music_kind, &sub.link))
        }))
        .await?;

        Ok(ordered
            .into_iter()
            .map(|sub| sub.display_name)
            .zip(items)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    async fn listen_round(state: &AppState, names: &[&str]) -> Round {
        let round = state
            .create_round("r", MusicKind::Track, HouseStrategy::Random)
            .await
            .unwrap();
        let ids = ["t1", "t2", "t3", "t4"];
        for (name, id) in names.iter().zip(ids) {
            state
                .submit_entry(&round.long_id, name, &link(MusicKind::Track, id), None)
                .await
                .unwrap();
        }
        state.advance(&round.long_id, RoundPhase::Listen).await.unwrap();
        round
    }

    #[test]
    fn test_random_permutation_is_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        for n in [0, 1, 2, 7] {
            let mut perm = random_permutation(&mut rng, n);
            perm.sort();
            assert_eq!(perm, (0..n).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_shuffle_in_submit_phase_fails() {
        let state = state();
        let round = state
            .create_round("r", MusicKind::Track, HouseStrategy::Random)
            .await
            .unwrap();
        let result = state.ensure_shuffled(&round.long_id).await;
        assert!(matches!(result, Err(RoundError::WrongPhase { .. })));
    }

    #[tokio::test]
    async fn test_shuffle_is_stable() {
        let state = state();
        let round = listen_round(&state, &["Alice", "Bob", "Carol"]).await;

        state.ensure_shuffled(&round.long_id).await.unwrap();
        let first: Vec<_> = state
            .get_submissions(&round.long_id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.shuffle_position)
            .collect();

        state.ensure_shuffled(&round.long_id).await.unwrap();
        let second: Vec<_> = state
            .get_submissions(&round.long_id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.shuffle_position)
            .collect();

        assert_eq!(first, second);
        let mut positions: Vec<usize> = first.into_iter().flatten().collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_partial_shuffle_is_internal_error() {
        let state = state();
        let round = listen_round(&state, &["Alice", "Bob"]).await;
        {
            let mut store = state.store.write().await;
            let sub = store.submissions.values_mut().next().unwrap();
            sub.shuffle_position = Some(0);
        }
        let result = state.ensure_shuffled(&round.long_id).await;
        assert!(matches!(result, Err(RoundError::Internal(_))));
    }

    #[tokio::test]
    async fn test_ordered_roster_follows_positions() {
        let state = state();
        let round = listen_round(&state, &["Alice", "Bob"]).await;

        let roster = state.get_ordered_roster(&round.long_id).await.unwrap();
        assert_eq!(roster.len(), 3);

        let subs = state.get_submissions(&round.long_id).await.unwrap();
        for (position, (name, item)) in roster.iter().enumerate() {
            let sub = subs.iter().find(|s| &s.display_name == name).unwrap();
            assert_eq!(sub.shuffle_position, Some(position));
            assert_eq!(item.link, sub.link);
        }
    }

    #[test]
    fn test_order_by_position_rejects_gaps() {
        let sub = |id: &str, pos: usize| Submission {
            id: id.to_string(),
            round_id: "r".to_string(),
            account_id: None,
            display_name: id.to_string(),
            link: String::new(),
            shuffle_position: Some(pos),
            seq: 0,
        };
        assert!(order_by_position(vec![sub("a", 1), sub("b", 0)]).is_ok());
        assert!(order_by_position(vec![sub("a", 0), sub("b", 0)]).is_err());
        assert!(order_by_position(vec![sub("a", 0), sub("b", 2)]).is_err());
    }
}
