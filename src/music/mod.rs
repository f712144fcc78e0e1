mod catalog;
mod spotify;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{MusicItem, MusicKind};

pub use catalog::{CatalogEntry, CatalogProvider};
pub use spotify::SpotifyProvider;

/// Result type for music provider operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Errors that can occur while talking to a music provider
#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("Link is not a valid {0} link")]
    InvalidLink(MusicKind),

    #[error("Nothing found: {0}")]
    NotFound(String),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("User authorization rejected")]
    Unauthorized,
}

/// Parameters for a catalog search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub phrase: String,
    /// Minimum artist popularity (0-100) for a result to be kept
    pub popularity_threshold: Option<u32>,
    pub max_results: Option<usize>,
}

impl SearchRequest {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            popularity_threshold: None,
            max_results: None,
        }
    }
}

/// Catalog/search/recommendation service boundary
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Resolve an external link to a canonical item of the given kind
    async fn resolve(&self, kind: MusicKind, link: &str) -> MusicResult<MusicItem>;

    /// Free-text search, ordered by provider relevance, filtered by popularity
    async fn search(&self, kind: MusicKind, request: SearchRequest) -> MusicResult<Vec<MusicItem>>;

    /// Produce one item similar to the seeds. Any random choices are drawn
    /// from `rng_seed` so a seeded caller gets repeatable picks.
    async fn recommend(
        &self,
        kind: MusicKind,
        seeds: &[MusicItem],
        rng_seed: u64,
    ) -> MusicResult<MusicItem>;

    /// Create a playlist on behalf of a user, returning its link
    async fn create_playlist(
        &self,
        user_token: &str,
        name: &str,
        items: &[MusicItem],
    ) -> MusicResult<String>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Extract the catalog id from an `open.spotify.com/<kind>/<id>` or
/// `spotify:<kind>:<id>` link. Returns None when the link is for another kind.
pub fn parse_link(kind: MusicKind, link: &str) -> Option<String> {
    let link = link.trim();
    let kind_str = kind.as_str();

    let id = if let Some(rest) = link.strip_prefix("spotify:") {
        let (link_kind, id) = rest.split_once(':')?;
        if link_kind != kind_str {
            return None;
        }
        id
    } else {
        let without_scheme = link
            .strip_prefix("https://")
            .or_else(|| link.strip_prefix("http://"))
            .unwrap_or(link);
        let path = without_scheme.strip_prefix("open.spotify.com/")?;
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut link_kind = segments.next()?;
        // Localized links look like open.spotify.com/intl-de/track/<id>
        if link_kind.starts_with("intl-") {
            link_kind = segments.next()?;
        }
        if link_kind != kind_str {
            return None;
        }
        segments.next()?
    };

    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| id.to_string())
}

/// Configuration for the music provider
#[derive(Debug, Clone)]
pub struct MusicConfig {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_api_base: String,
    pub spotify_auth_url: String,
    /// Optional JSON catalog used when no Spotify credentials are set
    pub catalog_file: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_api_base: "https://api.spotify.com/v1".to_string(),
            spotify_auth_url: "https://accounts.spotify.com/api/token".to_string(),
            catalog_file: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl MusicConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            spotify_client_id: non_empty_env("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_env("SPOTIFY_CLIENT_SECRET"),
            spotify_api_base: non_empty_env("SPOTIFY_API_BASE").unwrap_or(defaults.spotify_api_base),
            spotify_auth_url: non_empty_env("SPOTIFY_AUTH_URL").unwrap_or(defaults.spotify_auth_url),
            catalog_file: non_empty_env("CATALOG_FILE").map(PathBuf::from),
            request_timeout: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// Build the configured provider. Spotify wins over a catalog file.
    pub fn build_provider(&self) -> MusicResult<Arc<dyn MusicProvider>> {
        if let (Some(id), Some(secret)) = (&self.spotify_client_id, &self.spotify_client_secret) {
            return Ok(Arc::new(SpotifyProvider::new(
                id.clone(),
                secret.clone(),
                self.spotify_api_base.clone(),
                self.spotify_auth_url.clone(),
                self.request_timeout,
            )?));
        }

        if let Some(path) = &self.catalog_file {
            return Ok(Arc::new(CatalogProvider::from_file(path)?));
        }

        Err(MusicError::ConfigError(
            "No music provider configured. Set SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET or CATALOG_FILE"
                .to_string(),
        ))
    }
}
