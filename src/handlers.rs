//! Client message dispatch
//!
//! Every message gets exactly one reply. Round errors become
//! `ServerMessage::Error`, logged according to their class.

use crate::error::{ErrorClass, RoundError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{parse_guess_lines, AppState, GuessEntry};
use std::sync::Arc;
use std::time::Duration;

/// Handle a client message and return the reply
pub async fn handle_message(msg: ClientMessage, state: &Arc<AppState>) -> ServerMessage {
    match msg {
        ClientMessage::Login {
            external_user_id,
            display_name,
        } => match state
            .login_account(&external_user_id, display_name.as_deref())
            .await
        {
            Ok(account) => ServerMessage::LoggedIn { account },
            Err(e) => error_reply(e),
        },

        ClientMessage::CreateRound {
            description,
            music_kind,
            house_strategy,
        } => match state
            .create_round(&description, music_kind, house_strategy)
            .await
        {
            Ok(round) => ServerMessage::RoundCreated { round },
            Err(e) => error_reply(e),
        },

        ClientMessage::SubmitEntry {
            long_id,
            display_name,
            link,
            account_id,
        } => match state
            .submit_entry(&long_id, &display_name, &link, account_id.as_deref())
            .await
        {
            Ok(sub) => ServerMessage::SubmissionAccepted {
                long_id,
                display_name: sub.display_name,
                link: sub.link,
            },
            Err(e) => error_reply(e),
        },

        ClientMessage::Advance { long_id, target } => {
            match state.advance(&long_id, target).await {
                Ok(outcome) => ServerMessage::Advanced { long_id, outcome },
                Err(e) => error_reply(e),
            }
        }

        ClientMessage::GetRound {
            long_id,
            account_id,
        } => match state.get_view(&long_id, account_id.as_deref()).await {
            Ok(view) => ServerMessage::View { view },
            Err(e) => error_reply(e),
        },

        ClientMessage::SubmitGuess {
            long_id,
            guesser,
            guesses,
        } => handle_guess(state, long_id, guesser, guesses).await,

        ClientMessage::SubmitGuessText {
            long_id,
            guesser,
            text,
        } => match parse_guess_lines(&text) {
            Ok(guesses) => handle_guess(state, long_id, guesser, guesses).await,
            Err(e) => error_reply(e),
        },

        ClientMessage::ScheduleAdvance {
            long_id,
            interval_secs,
        } => match state
            .schedule_round_advance(&long_id, Duration::from_secs(interval_secs))
            .await
        {
            Ok(job_id) => ServerMessage::Scheduled {
                long_id,
                job_id,
                interval_secs,
            },
            Err(e) => error_reply(e),
        },

        ClientMessage::CancelSchedule { long_id } => {
            match state.cancel_round_advance(&long_id).await {
                Ok(was_active) => ServerMessage::ScheduleCancelled {
                    long_id,
                    was_active,
                },
                Err(e) => error_reply(e),
            }
        }

        ClientMessage::CreatePlaylist {
            long_id,
            account_id,
            name,
        } => match state.create_playlist(&long_id, &account_id, &name).await {
            Ok(link) => ServerMessage::PlaylistCreated { long_id, link },
            Err(e) => error_reply(e),
        },

        ClientMessage::CompleteAuth {
            action_id,
            provider_token,
        } => match state
            .complete_external_auth(&action_id, &provider_token)
            .await
        {
            Ok(result) => ServerMessage::Resumed { result },
            Err(e) => error_reply(e),
        },
    }
}

async fn handle_guess(
    state: &Arc<AppState>,
    long_id: String,
    guesser: String,
    guesses: Vec<GuessEntry>,
) -> ServerMessage {
    match state.submit_guess(&long_id, &guesser, &guesses).await {
        Ok(recorded) => ServerMessage::GuessRecorded {
            long_id,
            guesser,
            count: recorded.len(),
        },
        Err(e) => error_reply(e),
    }
}

/// Turn a round error into a reply, logging it by class
pub fn error_reply(err: RoundError) -> ServerMessage {
    let err = match err {
        RoundError::AuthRequired { action_id } => return ServerMessage::AuthRequired { action_id },
        other => other,
    };

    match err.class() {
        ErrorClass::User => tracing::debug!("Rejected: {}", err),
        ErrorClass::External => tracing::warn!("Provider trouble: {}", err),
        ErrorClass::Internal => tracing::error!("Internal error: {}", err),
    }
    ServerMessage::Error {
        code: err.code().to_string(),
        msg: err.user_message(),
    }
}
