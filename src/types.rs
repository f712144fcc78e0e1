use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoundId = String;
pub type LongId = String;
pub type SubmissionId = String;
pub type GuessId = String;
pub type AccountId = String;
pub type PendingActionId = String;

/// Display name reserved for the house recommendation
pub const HOUSE_NAME: &str = "snoozin";

/// Storage limits
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_LINK_LENGTH: usize = 100;
pub const MAX_PLAYLIST_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MusicKind {
    Track,
    Album,
}

impl MusicKind {
    /// Path segment / type name used by catalog links and search
    pub fn as_str(&self) -> &'static str {
        match self {
            MusicKind::Track => "track",
            MusicKind::Album => "album",
        }
    }

    /// Example link shown next to link validation errors
    pub fn example_link(&self) -> &'static str {
        match self {
            MusicKind::Track => "https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6",
            MusicKind::Album => "https://open.spotify.com/album/3a0UOgDWw2pTajw85QPMiz",
        }
    }
}

impl std::fmt::Display for MusicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HouseStrategy {
    Random,
    Similar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Submit,
    Listen,
    Revealed,
}

impl RoundPhase {
    /// The only phase this one may advance to
    pub fn next(&self) -> Option<RoundPhase> {
        match self {
            RoundPhase::Submit => Some(RoundPhase::Listen),
            RoundPhase::Listen => Some(RoundPhase::Revealed),
            RoundPhase::Revealed => None,
        }
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoundPhase::Submit => "submit",
            RoundPhase::Listen => "listen",
            RoundPhase::Revealed => "revealed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub long_id: LongId,
    pub description: String,
    pub music_kind: MusicKind,
    pub house_strategy: HouseStrategy,
    pub phase: RoundPhase,
    /// Phrase that found the house rec (random strategy only)
    pub house_search_term: Option<String>,
    pub playlist_link: Option<String>,
    pub created_at: String,
    /// Set when a phase scheduler job was requested, so it can be restored
    #[serde(default)]
    pub advance_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub round_id: RoundId,
    pub account_id: Option<AccountId>,
    pub display_name: String,
    pub link: String,
    pub shuffle_position: Option<usize>,
    /// Insertion order within the store
    pub seq: u64,
}

impl Submission {
    pub fn is_house(&self) -> bool {
        self.display_name == HOUSE_NAME && self.account_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guess {
    pub id: GuessId,
    /// The guesser's own submission
    pub submission_id: SubmissionId,
    pub target_display_name: String,
    pub guessed_position: usize,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub external_user_id: String,
    pub display_name: Option<String>,
    /// Access token for user-scoped provider calls (playlist creation).
    /// Never serialized, so it stays out of snapshots and responses.
    #[serde(default, skip_serializing)]
    pub provider_token: Option<String>,
}

/// An operation that was interrupted by external authentication.
/// Stored as data and rebuilt when the auth callback arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: PendingActionId,
    pub account_id: AccountId,
    pub round_id: RoundId,
    pub action: PendingActionKind,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingActionKind {
    CreatePlaylist { name: String },
}

/// A resolved catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MusicItem {
    pub link: String,
    pub title: String,
    pub artists: Vec<String>,
    pub artwork_url: Option<String>,
    /// Artist identifiers, used to keep recommendations away from seed artists
    #[serde(default)]
    pub artist_ids: Vec<String>,
    /// Search phrase that produced this item, if any
    #[serde(default)]
    pub search_term: Option<String>,
}

impl std::fmt::Display for MusicItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.title, self.artists.join(", "))
    }
}
