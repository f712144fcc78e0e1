use super::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tokio::sync::RwLock;

/// Maximum number of seeds the recommendations endpoint accepts
const MAX_REC_SEEDS: usize = 5;

/// How many recommendation calls to make before giving up
const MAX_REC_ATTEMPTS: u32 = 5;

/// Artwork sizes picked for each kind
const ALBUM_ART_DIMEN: u32 = 300;
const TRACK_ART_DIMEN: u32 = 64;

/// Spotify Web API provider using the client credentials flow
pub struct SpotifyProvider {
    client_id: String,
    client_secret: String,
    api_base: String,
    auth_url: String,
    timeout: Duration,
    client: reqwest::Client,
    /// Cached app token and its expiry
    token: RwLock<Option<(String, Instant)>>,
}

impl SpotifyProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_base: String,
        auth_url: String,
        timeout: Duration,
    ) -> MusicResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MusicError::ConfigError(e.to_string()))?;

        Ok(Self {
            client_id,
            client_secret,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth_url,
            timeout,
            client,
            token: RwLock::new(None),
        })
    }

    /// Get a valid app token, refreshing it when expired
    async fn app_token(&self) -> MusicResult<String> {
        if let Some((token, expires_at)) = self.token.read().await.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&self.auth_url)
                .header("Authorization", format!("Basic {}", credentials))
                .form(&[("grant_type", "client_credentials")])
                .send(),
        )
        .await
        .map_err(|_| MusicError::Timeout(self.timeout))?
        .map_err(|e| MusicError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MusicError::ApiError(format!(
                "Token request returned status: {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MusicError::ParseError(e.to_string()))?;

        // Refresh a minute early
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *self.token.write().await = Some((token.access_token.clone(), Instant::now() + lifetime));
        tracing::debug!("Refreshed Spotify app token");

        Ok(token.access_token)
    }

    /// GET an API path with the app token and decode the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> MusicResult<T> {
        let token = self.app_token().await?;
        self.send_json(self.client.get(self.url(path)).query(query), &token)
            .await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> MusicResult<T> {
        let response = tokio::time::timeout(self.timeout, request.bearer_auth(token).send())
            .await
            .map_err(|_| MusicError::Timeout(self.timeout))?
            .map_err(|e| MusicError::ApiError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(MusicError::NotFound(format!("status {}", status)));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MusicError::Unauthorized);
        }
        if !status.is_success() {
            return Err(MusicError::ApiError(format!(
                "Spotify API returned status: {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MusicError::ParseError(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Highest popularity among each artist, keyed by artist id
    async fn artist_popularity(&self, artist_ids: &[String]) -> MusicResult<HashMap<String, u32>> {
        let mut popularity = HashMap::new();
        // The several-artists endpoint takes at most 50 ids
        for chunk in artist_ids.chunks(50) {
            let artists: ArtistsResponse = self
                .get_json("artists", &[("ids", chunk.join(","))])
                .await?;
            for artist in artists.artists.into_iter().flatten() {
                popularity.insert(artist.id, artist.popularity.unwrap_or(0));
            }
        }
        Ok(popularity)
    }

    /// Ask for recommended tracks and drop any that share an artist with the seeds
    async fn recommended_track(
        &self,
        rng: &mut StdRng,
        seeds: &[MusicItem],
        seed_param: (&str, Vec<String>),
    ) -> MusicResult<Option<MusicItem>> {
        let (param, ids) = seed_param;
        let response: RecommendationsResponse = self
            .get_json("recommendations", &[(param, ids.join(","))])
            .await?;

        let seed_artists: HashSet<&String> =
            seeds.iter().flat_map(|s| s.artist_ids.iter()).collect();

        let candidates: Vec<MusicItem> = response
            .tracks
            .into_iter()
            .map(|t| t.into_item(None))
            .filter(|t| !t.artist_ids.iter().any(|id| seed_artists.contains(id)))
            .collect();

        Ok(candidates.choose(rng).cloned())
    }

    async fn recommend_track(&self, rng: &mut StdRng, seeds: &[MusicItem]) -> MusicResult<MusicItem> {
        let seed_ids = sample_seeds(
            rng,
            seeds
                .iter()
                .filter_map(|s| parse_link(MusicKind::Track, &s.link))
                .collect(),
        );

        for _ in 0..MAX_REC_ATTEMPTS {
            if let Some(track) = self
                .recommended_track(rng, seeds, ("seed_tracks", seed_ids.clone()))
                .await?
            {
                return Ok(track);
            }
        }

        Err(MusicError::NotFound(
            "no track recommendation outside the seed artists".to_string(),
        ))
    }

    async fn recommend_album(&self, rng: &mut StdRng, seeds: &[MusicItem]) -> MusicResult<MusicItem> {
        let seed_artists = sample_seeds(
            rng,
            seeds
                .iter()
                .filter_map(|s| s.artist_ids.first().cloned())
                .collect(),
        );

        for _ in 0..MAX_REC_ATTEMPTS {
            let Some(track) = self
                .recommended_track(rng, seeds, ("seed_artists", seed_artists.clone()))
                .await?
            else {
                continue;
            };
            let Some(artist_id) = track.artist_ids.first() else {
                continue;
            };

            // Pick a random album from the recommended track's primary artist
            let albums: Paging<SpotifyAlbum> = self
                .get_json(
                    &format!("artists/{}/albums", artist_id),
                    &[("include_groups", "album".to_string())],
                )
                .await?;
            let picked = albums.items.choose(rng).cloned();
            if let Some(album) = picked {
                return Ok(album.into_item(None));
            }
        }

        Err(MusicError::NotFound(
            "no album recommendation outside the seed artists".to_string(),
        ))
    }
}

fn sample_seeds<R: Rng + ?Sized>(rng: &mut R, mut ids: Vec<String>) -> Vec<String> {
    if ids.len() > MAX_REC_SEEDS {
        ids.shuffle(rng);
        ids.truncate(MAX_REC_SEEDS);
    }
    ids
}

fn pick_artwork(images: &[SpotifyImage], dimen: u32) -> Option<String> {
    images
        .iter()
        .find(|img| img.height == Some(dimen) && img.width == Some(dimen))
        .or_else(|| images.first())
        .map(|img| img.url.clone())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SpotifyArtist {
    id: String,
    name: String,
    #[serde(default)]
    popularity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    artists: Vec<Option<SpotifyArtist>>,
}

#[derive(Debug, Clone, Deserialize)]
struct SpotifyImage {
    url: String,
    height: Option<u32>,
    width: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExternalUrls {
    spotify: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SpotifyAlbum {
    name: String,
    artists: Vec<SpotifyArtist>,
    external_urls: ExternalUrls,
    #[serde(default)]
    images: Vec<SpotifyImage>,
    #[serde(default)]
    album_type: Option<String>,
}

impl SpotifyAlbum {
    fn into_item(self, search_term: Option<String>) -> MusicItem {
        MusicItem {
            link: self.external_urls.spotify,
            title: self.name,
            artists: self.artists.iter().map(|a| a.name.clone()).collect(),
            artwork_url: pick_artwork(&self.images, ALBUM_ART_DIMEN),
            artist_ids: self.artists.into_iter().map(|a| a.id).collect(),
            search_term,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SpotifyTrack {
    name: String,
    artists: Vec<SpotifyArtist>,
    external_urls: ExternalUrls,
    album: SpotifyAlbum,
}

impl SpotifyTrack {
    fn into_item(self, search_term: Option<String>) -> MusicItem {
        MusicItem {
            link: self.external_urls.spotify,
            title: self.name,
            artists: self.artists.iter().map(|a| a.name.clone()).collect(),
            artwork_url: pick_artwork(&self.album.images, TRACK_ART_DIMEN),
            artist_ids: self.artists.into_iter().map(|a| a.id).collect(),
            search_term,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<Paging<SpotifyTrack>>,
    #[serde(default)]
    albums: Option<Paging<SpotifyAlbum>>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
    public: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
    external_urls: ExternalUrls,
}

#[derive(Debug, Serialize)]
struct AddTracksRequest {
    uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[allow(dead_code)] // Part of the add-tracks response format
    snapshot_id: String,
}

#[async_trait]
impl MusicProvider for SpotifyProvider {
    async fn resolve(&self, kind: MusicKind, link: &str) -> MusicResult<MusicItem> {
        let id = parse_link(kind, link).ok_or(MusicError::InvalidLink(kind))?;

        let result = match kind {
            MusicKind::Track => self
                .get_json::<SpotifyTrack>(&format!("tracks/{}", id), &[])
                .await
                .map(|t| t.into_item(None)),
            MusicKind::Album => self
                .get_json::<SpotifyAlbum>(&format!("albums/{}", id), &[])
                .await
                .map(|a| a.into_item(None)),
        };

        match result {
            Err(MusicError::NotFound(_)) => Err(MusicError::InvalidLink(kind)),
            other => other,
        }
    }

    async fn search(&self, kind: MusicKind, request: SearchRequest) -> MusicResult<Vec<MusicItem>> {
        let start = Instant::now();
        let response: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("q", request.phrase.clone()),
                    ("type", kind.as_str().to_string()),
                ],
            )
            .await?;

        let term = Some(request.phrase.clone());
        let items: Vec<MusicItem> = match kind {
            MusicKind::Track => response
                .tracks
                .map(|p| p.items)
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.into_item(term.clone()))
                .collect(),
            // Singles and compilations don't count as albums
            MusicKind::Album => response
                .albums
                .map(|p| p.items)
                .unwrap_or_default()
                .into_iter()
                .filter(|a| a.album_type.as_deref() == Some("album"))
                .map(|a| a.into_item(term.clone()))
                .collect(),
        };

        let items = match request.popularity_threshold {
            Some(threshold) if !items.is_empty() => {
                let mut artist_ids: Vec<String> =
                    items.iter().flat_map(|i| i.artist_ids.clone()).collect();
                artist_ids.sort();
                artist_ids.dedup();
                let popularity = self.artist_popularity(&artist_ids).await?;

                items
                    .into_iter()
                    .filter(|item| {
                        item.artist_ids
                            .iter()
                            .filter_map(|id| popularity.get(id))
                            .max()
                            .is_some_and(|p| *p >= threshold)
                    })
                    .collect()
            }
            _ => items,
        };

        let mut items = items;
        if let Some(max) = request.max_results {
            items.truncate(max);
        }

        tracing::debug!(
            "Spotify search '{}' ({}) returned {} usable items in {}ms",
            request.phrase,
            kind.as_str(),
            items.len(),
            start.elapsed().as_millis()
        );

        Ok(items)
    }

    async fn recommend(
        &self,
        kind: MusicKind,
        seeds: &[MusicItem],
        rng_seed: u64,
    ) -> MusicResult<MusicItem> {
        if seeds.is_empty() {
            return Err(MusicError::NotFound("no seeds given".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(rng_seed);
        match kind {
            MusicKind::Track => self.recommend_track(&mut rng, seeds).await,
            MusicKind::Album => self.recommend_album(&mut rng, seeds).await,
        }
    }

    async fn create_playlist(
        &self,
        user_token: &str,
        name: &str,
        items: &[MusicItem],
    ) -> MusicResult<String> {
        let user: CurrentUser = self
            .send_json(self.client.get(self.url("me")), user_token)
            .await?;

        let playlist: CreatedPlaylist = self
            .send_json(
                self.client
                    .post(self.url(&format!("users/{}/playlists", user.id)))
                    .json(&CreatePlaylistRequest {
                        name,
                        public: false,
                    }),
                user_token,
            )
            .await?;

        let uris = items
            .iter()
            .filter_map(|item| parse_link(MusicKind::Track, &item.link))
            .map(|id| format!("spotify:track:{}", id))
            .collect();

        let _: SnapshotResponse = self
            .send_json(
                self.client
                    .post(self.url(&format!("playlists/{}/tracks", playlist.id)))
                    .json(&AddTracksRequest { uris }),
                user_token,
            )
            .await?;

        tracing::info!("Created Spotify playlist '{}' for user {}", name, user.id);
        Ok(playlist.external_urls.spotify)
    }

    fn name(&self) -> &str {
        "spotify"
    }
}
