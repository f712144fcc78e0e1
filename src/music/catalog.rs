use super::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// One catalog row: an item, its kind and its artist popularity (0-100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: MusicKind,
    #[serde(default)]
    pub popularity: u32,
    #[serde(flatten)]
    pub item: MusicItem,
}

/// Provider backed by a fixed in-memory catalog.
///
/// Used for local development without Spotify credentials and in tests.
/// Items are keyed by the id parsed from their link, so share links with
/// query strings resolve to the same entry.
pub struct CatalogProvider {
    entries: Vec<CatalogEntry>,
    /// Playlists created so far: (user token, name, item links)
    playlists: Mutex<Vec<(String, String, Vec<String>)>>,
    /// Tokens that are accepted for playlist creation (None = accept any)
    valid_tokens: Option<Vec<String>>,
}

impl CatalogProvider {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            playlists: Mutex::new(Vec::new()),
            valid_tokens: None,
        }
    }

    /// Only accept the given user tokens for playlist creation
    pub fn with_valid_tokens(mut self, tokens: Vec<String>) -> Self {
        self.valid_tokens = Some(tokens);
        self
    }

    /// Load a JSON array of catalog entries
    pub fn from_file(path: &Path) -> MusicResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MusicError::ConfigError(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&content).map_err(|e| MusicError::ParseError(e.to_string()))?;
        tracing::info!(
            "Loaded {} catalog entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self::new(entries))
    }

    /// Playlists created through this provider, as (name, item links)
    pub fn created_playlists(&self) -> Vec<(String, Vec<String>)> {
        self.playlists
            .lock()
            .map(|p| p.iter().map(|(_, name, links)| (name.clone(), links.clone())).collect())
            .unwrap_or_default()
    }

    fn find(&self, kind: MusicKind, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| {
            e.kind == kind && parse_link(kind, &e.item.link).as_deref() == Some(id)
        })
    }
}

fn matches_phrase(item: &MusicItem, phrase: &str) -> bool {
    let haystack = format!("{} {}", item.title, item.artists.join(" ")).to_lowercase();
    phrase
        .split_whitespace()
        .any(|word| haystack.contains(&word.to_lowercase()))
}

#[async_trait]
impl MusicProvider for CatalogProvider {
    async fn resolve(&self, kind: MusicKind, link: &str) -> MusicResult<MusicItem> {
        let id = parse_link(kind, link).ok_or(MusicError::InvalidLink(kind))?;
        self.find(kind, &id)
            .map(|e| e.item.clone())
            .ok_or(MusicError::InvalidLink(kind))
    }

    async fn search(&self, kind: MusicKind, request: SearchRequest) -> MusicResult<Vec<MusicItem>> {
        let threshold = request.popularity_threshold.unwrap_or(0);
        let mut items: Vec<MusicItem> = self
            .entries
            .iter()
            .filter(|e| e.kind == kind && e.popularity >= threshold)
            .filter(|e| matches_phrase(&e.item, &request.phrase))
            .map(|e| MusicItem {
                search_term: Some(request.phrase.clone()),
                ..e.item.clone()
            })
            .collect();

        if let Some(max) = request.max_results {
            items.truncate(max);
        }
        Ok(items)
    }

    async fn recommend(
        &self,
        kind: MusicKind,
        seeds: &[MusicItem],
        _rng_seed: u64,
    ) -> MusicResult<MusicItem> {
        if seeds.is_empty() {
            return Err(MusicError::NotFound("no seeds given".to_string()));
        }

        // First item of the kind sharing no artist with any seed
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .find(|e| {
                seeds.iter().all(|seed| {
                    seed.link != e.item.link
                        && !seed.artists.iter().any(|a| e.item.artists.contains(a))
                })
            })
            .map(|e| e.item.clone())
            .ok_or_else(|| MusicError::NotFound("no recommendation in catalog".to_string()))
    }

    async fn create_playlist(
        &self,
        user_token: &str,
        name: &str,
        items: &[MusicItem],
    ) -> MusicResult<String> {
        if let Some(valid) = &self.valid_tokens {
            if !valid.iter().any(|t| t == user_token) {
                return Err(MusicError::Unauthorized);
            }
        }

        let mut playlists = self
            .playlists
            .lock()
            .map_err(|_| MusicError::ApiError("playlist store poisoned".to_string()))?;
        playlists.push((
            user_token.to_string(),
            name.to_string(),
            items.iter().map(|i| i.link.clone()).collect(),
        ));
        Ok(format!(
            "https://open.spotify.com/playlist/catalog{}",
            playlists.len()
        ))
    }

    fn name(&self) -> &str {
        "catalog"
    }
}
