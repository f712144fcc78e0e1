use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::music::SearchRequest;
use crate::types::*;
use futures::future::try_join_all;
use rand::Rng;

impl AppState {
    /// Pick the house recommendation for a round, following its strategy.
    /// Does not write anything; `advance` stores the result.
    pub async fn generate_house_rec(&self, round: &Round) -> RoundResult<MusicItem> {
        match round.house_strategy {
            HouseStrategy::Random => self.random_house_rec(round.music_kind).await,
            HouseStrategy::Similar => self.similar_house_rec(round).await,
        }
    }

    /// Search random phrases until one turns up a popular enough item
    async fn random_house_rec(&self, kind: MusicKind) -> RoundResult<MusicItem> {
        let attempts = self.config.house_max_attempts;

        for attempt in 1..=attempts {
            let phrase = self.with_rng(|rng| self.words.random_phrase(rng));
            let mut request = SearchRequest::new(phrase.clone());
            request.popularity_threshold = Some(self.config.popularity_threshold);

            match self
                .call_provider(self.provider.search(kind, request))
                .await
            {
                Ok(items) => {
                    if let Some(item) = items.into_iter().next() {
                        tracing::debug!("House search '{}' hit on attempt {}", phrase, attempt);
                        return Ok(MusicItem {
                            search_term: Some(phrase),
                            ..item
                        });
                    }
                    tracing::debug!("House search '{}' found nothing", phrase);
                }
                Err(e) => {
                    tracing::warn!("House search '{}' failed: {}", phrase, e);
                }
            }
        }

        tracing::warn!("No house {} found after {} searches", kind, attempts);
        Err(RoundError::HouseRecExhausted { attempts })
    }

    /// Recommend from the music of every human submission
    async fn similar_house_rec(&self, round: &Round) -> RoundResult<MusicItem> {
        let links: Vec<String> = {
            let store = self.store.read().await;
            store
                .round_submissions(&round.id)
                .into_iter()
                .filter(|s| !s.is_house())
                .map(|s| s.link.clone())
                .collect()
        };
        if links.is_empty() {
            return Err(RoundError::InsufficientSeeds);
        }

        let seeds = try_join_all(
            links
                .iter()
                .map(|link| self.call_provider(self.provider.resolve(round.music_kind, link))),
        )
        .await?;

        let rng_seed = self.with_rng(|rng| rng.random::<u64>());
        let rec = self
            .call_provider(self.provider.recommend(round.music_kind, &seeds, rng_seed))
            .await?;
        Ok(rec)
    }
}
