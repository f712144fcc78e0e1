//! Typed failures of round operations.

use crate::music::MusicError;
use crate::types::{MusicKind, RoundPhase};

pub type RoundResult<T> = Result<T, RoundError>;

/// Who a failure is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recoverable, shown to the acting user
    User,
    /// The music provider failed or had nothing usable; retrying the action may help
    External,
    /// Invariant violation, logged and surfaced generically
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error("Round not found")]
    RoundNotFound,

    #[error("This round is currently in the {actual} phase")]
    WrongPhase {
        expected: RoundPhase,
        actual: RoundPhase,
    },

    #[error("The name '{0}' is already taken for this round")]
    DuplicateName(String),

    #[error("You've already submitted to this round")]
    DuplicateAccountSubmission,

    #[error("This town is only big enough for one {0}")]
    ReservedName(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("A round needs a description")]
    InvalidDescription,

    #[error("Invalid {} link (ex: {})", .kind.as_str(), .kind.example_link())]
    InvalidLink { kind: MusicKind },

    #[error("Malformed guess: {0}")]
    MalformedGuess(String),

    #[error("'{0}' is not a participant in this round")]
    UnknownGuesser(String),

    #[error("'{0}' has already guessed")]
    AlreadyGuessed(String),

    #[error("Playlists can only be created for track rounds")]
    PlaylistUnsupported,

    #[error("This round already has a playlist")]
    PlaylistExists,

    #[error("Invalid playlist name: {0}")]
    InvalidPlaylistName(String),

    #[error("External authorization required")]
    AuthRequired { action_id: String },

    #[error("Invalid schedule interval: {0}")]
    InvalidInterval(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Pending action not found")]
    PendingActionNotFound,

    #[error("Couldn't find a house recommendation after {attempts} searches, try again")]
    HouseRecExhausted { attempts: u32 },

    #[error("A similar recommendation needs at least one submission")]
    InsufficientSeeds,

    #[error("Music provider error: {0}")]
    Provider(#[from] MusicError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoundError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RoundError::HouseRecExhausted { .. }
            | RoundError::InsufficientSeeds
            | RoundError::Provider(_) => ErrorClass::External,
            RoundError::Internal(_) => ErrorClass::Internal,
            _ => ErrorClass::User,
        }
    }

    /// Stable code used in protocol error messages
    pub fn code(&self) -> &'static str {
        match self {
            RoundError::RoundNotFound => "ROUND_NOT_FOUND",
            RoundError::WrongPhase { .. } => "WRONG_PHASE",
            RoundError::DuplicateName(_) => "DUPLICATE_NAME",
            RoundError::DuplicateAccountSubmission => "DUPLICATE_ACCOUNT_SUBMISSION",
            RoundError::ReservedName(_) => "RESERVED_NAME",
            RoundError::InvalidName(_) => "INVALID_NAME",
            RoundError::InvalidDescription => "INVALID_DESCRIPTION",
            RoundError::InvalidLink { .. } => "INVALID_LINK",
            RoundError::MalformedGuess(_) => "MALFORMED_GUESS",
            RoundError::UnknownGuesser(_) => "UNKNOWN_GUESSER",
            RoundError::AlreadyGuessed(_) => "ALREADY_GUESSED",
            RoundError::PlaylistUnsupported => "PLAYLIST_UNSUPPORTED",
            RoundError::PlaylistExists => "PLAYLIST_EXISTS",
            RoundError::InvalidPlaylistName(_) => "INVALID_PLAYLIST_NAME",
            RoundError::AuthRequired { .. } => "AUTH_REQUIRED",
            RoundError::InvalidInterval(_) => "INVALID_INTERVAL",
            RoundError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            RoundError::PendingActionNotFound => "PENDING_ACTION_NOT_FOUND",
            RoundError::HouseRecExhausted { .. } => "HOUSE_REC_EXHAUSTED",
            RoundError::InsufficientSeeds => "INSUFFICIENT_SEEDS",
            RoundError::Provider(_) => "PROVIDER_ERROR",
            RoundError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the acting user
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::Internal => "Something went wrong on our end".to_string(),
            ErrorClass::External | ErrorClass::User => self.to_string(),
        }
    }
}
