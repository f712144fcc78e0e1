use crate::state::{AdvanceOutcome, GuessEntry, ResumedAction, RoundView};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Login {
        external_user_id: String,
        display_name: Option<String>,
    },
    CreateRound {
        description: String,
        music_kind: MusicKind,
        house_strategy: HouseStrategy,
    },
    /// Submit music, or edit the account's existing submission
    SubmitEntry {
        long_id: LongId,
        display_name: String,
        link: String,
        #[serde(default)]
        account_id: Option<AccountId>,
    },
    Advance {
        long_id: LongId,
        target: RoundPhase,
    },
    GetRound {
        long_id: LongId,
        #[serde(default)]
        account_id: Option<AccountId>,
    },
    SubmitGuess {
        long_id: LongId,
        guesser: String,
        guesses: Vec<GuessEntry>,
    },
    /// Guesses as `name: position` lines
    SubmitGuessText {
        long_id: LongId,
        guesser: String,
        text: String,
    },
    ScheduleAdvance {
        long_id: LongId,
        interval_secs: u64,
    },
    CancelSchedule {
        long_id: LongId,
    },
    CreatePlaylist {
        long_id: LongId,
        account_id: AccountId,
        name: String,
    },
    /// Sent by the auth callback once the provider granted a token
    CompleteAuth {
        action_id: PendingActionId,
        provider_token: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    LoggedIn {
        account: Account,
    },
    RoundCreated {
        round: Round,
    },
    SubmissionAccepted {
        long_id: LongId,
        display_name: String,
        link: String,
    },
    Advanced {
        long_id: LongId,
        outcome: AdvanceOutcome,
    },
    View {
        view: RoundView,
    },
    /// Correctness stays hidden until the reveal
    GuessRecorded {
        long_id: LongId,
        guesser: String,
        count: usize,
    },
    Scheduled {
        long_id: LongId,
        job_id: String,
        interval_secs: u64,
    },
    ScheduleCancelled {
        long_id: LongId,
        was_active: bool,
    },
    PlaylistCreated {
        long_id: LongId,
        link: String,
    },
    /// The action was parked; finish external auth, then send `CompleteAuth`
    AuthRequired {
        action_id: PendingActionId,
    },
    Resumed {
        result: ResumedAction,
    },
    Error {
        code: String,
        msg: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"create_round","description":"jams","music_kind":"track","house_strategy":"similar"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::CreateRound {
                music_kind: MusicKind::Track,
                house_strategy: HouseStrategy::Similar,
                ..
            }
        ));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"submit_entry","long_id":"abc","display_name":"Alice","link":"spotify:track:1"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::SubmitEntry { account_id: None, .. }));
    }

    #[test]
    fn test_error_serialization() {
        let msg = ServerMessage::Error {
            code: "DUPLICATE_NAME".to_string(),
            msg: "taken".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "error");
        assert_eq!(json["code"], "DUPLICATE_NAME");
    }
}
