use musicrecs::handlers::handle_message;
use musicrecs::music::{CatalogEntry, CatalogProvider};
use musicrecs::protocol::{ClientMessage, ServerMessage};
use musicrecs::state::{AdvanceOutcome, AppState, GuessEntry, ResumedAction};
use musicrecs::types::{HouseStrategy, MusicItem, MusicKind, RoundPhase, HOUSE_NAME};
use musicrecs::words::Words;
use std::sync::Arc;

fn track(id: &str, title: &str, artist: &str, popularity: u32) -> CatalogEntry {
    CatalogEntry {
        kind: MusicKind::Track,
        popularity,
        item: MusicItem {
            link: track_link(id),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            artwork_url: None,
            artist_ids: vec![artist.to_lowercase()],
            search_term: None,
        },
    }
}

fn track_link(id: &str) -> String {
    format!("https://open.spotify.com/track/{}", id)
}

fn new_state() -> Arc<AppState> {
    let provider = CatalogProvider::new(vec![
        track("linkA", "Moon River", "Audrey", 80),
        track("linkB", "Harvest Moon", "Neil", 75),
        track("linkC", "Sunrise", "Norah", 60),
        track("linkD", "Blue Moon Dance", "Ella", 55),
    ]);
    Arc::new(
        AppState::new(Arc::new(provider))
            .with_words(Words::new(vec!["dance".to_string()]))
            .with_seed(2024),
    )
}

async fn create_round(state: &Arc<AppState>, strategy: HouseStrategy) -> String {
    match handle_message(
        ClientMessage::CreateRound {
            description: "Songs for a rainy day".to_string(),
            music_kind: MusicKind::Track,
            house_strategy: strategy,
        },
        state,
    )
    .await
    {
        ServerMessage::RoundCreated { round } => {
            assert_eq!(round.phase, RoundPhase::Submit);
            round.long_id
        }
        other => panic!("Expected RoundCreated, got {:?}", other),
    }
}

async fn submit(
    state: &Arc<AppState>,
    long_id: &str,
    name: &str,
    link_id: &str,
    account_id: Option<&str>,
) -> ServerMessage {
    handle_message(
        ClientMessage::SubmitEntry {
            long_id: long_id.to_string(),
            display_name: name.to_string(),
            link: track_link(link_id),
            account_id: account_id.map(String::from),
        },
        state,
    )
    .await
}

async fn advance(state: &Arc<AppState>, long_id: &str, target: RoundPhase) -> AdvanceOutcome {
    match handle_message(
        ClientMessage::Advance {
            long_id: long_id.to_string(),
            target,
        },
        state,
    )
    .await
    {
        ServerMessage::Advanced { outcome, .. } => outcome,
        other => panic!("Expected Advanced, got {:?}", other),
    }
}

/// End-to-end: two participants, the house entry, one guess batch, reveal
#[tokio::test]
async fn test_full_round_flow() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;

    assert!(matches!(
        submit(&state, &long_id, "Alice", "linkA", None).await,
        ServerMessage::SubmissionAccepted { .. }
    ));
    assert!(matches!(
        submit(&state, &long_id, "Bob", "linkB", None).await,
        ServerMessage::SubmissionAccepted { .. }
    ));

    let outcome = advance(&state, &long_id, RoundPhase::Listen).await;
    assert!(outcome.advanced());

    // Listen view: three anonymous entries at positions 0..3
    let view = match handle_message(
        ClientMessage::GetRound {
            long_id: long_id.clone(),
            account_id: None,
        },
        &state,
    )
    .await
    {
        ServerMessage::View { view } => view,
        other => panic!("Expected View, got {:?}", other),
    };
    assert_eq!(view.phase, RoundPhase::Listen);
    let mut positions: Vec<usize> = view.roster.iter().map(|e| e.position).collect();
    positions.sort();
    assert_eq!(positions, vec![0, 1, 2]);
    assert!(view.roster.iter().all(|e| e.display_name.is_none()));
    assert_eq!(view.participants, vec!["Alice", "Bob", HOUSE_NAME]);

    // House rec came from the word list
    let round = state.get_round(&long_id).await.unwrap();
    assert_eq!(round.house_search_term.as_deref(), Some("dance"));

    // Alice places herself correctly and swaps the other two
    let roster = state.get_ordered_roster(&long_id).await.unwrap();
    let position_of = |name: &str| roster.iter().position(|(n, _)| n == name).unwrap();
    let guesses = vec![
        GuessEntry::new("Alice", position_of("Alice")),
        GuessEntry::new("Bob", position_of(HOUSE_NAME)),
        GuessEntry::new(HOUSE_NAME, position_of("Bob")),
    ];
    let reply = handle_message(
        ClientMessage::SubmitGuess {
            long_id: long_id.clone(),
            guesser: "Alice".to_string(),
            guesses,
        },
        &state,
    )
    .await;
    assert!(matches!(reply, ServerMessage::GuessRecorded { count: 3, .. }));

    assert!(advance(&state, &long_id, RoundPhase::Revealed).await.advanced());

    let view = match handle_message(
        ClientMessage::GetRound {
            long_id: long_id.clone(),
            account_id: None,
        },
        &state,
    )
    .await
    {
        ServerMessage::View { view } => view,
        other => panic!("Expected View, got {:?}", other),
    };
    assert_eq!(view.phase, RoundPhase::Revealed);
    assert_eq!(view.results.len(), 1);
    assert_eq!(view.results[0].guesser, "Alice");
    assert_eq!(view.results[0].correct, 1);
    assert_eq!(view.results[0].total, 3);

    // Shuffle did not move after the reveal
    let revealed: Vec<String> = view
        .roster
        .iter()
        .map(|e| e.display_name.clone().unwrap())
        .collect();
    let expected: Vec<String> = roster.into_iter().map(|(name, _)| name).collect();
    assert_eq!(revealed, expected);
}

#[tokio::test]
async fn test_account_edit_replaces_submission() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;

    let account = match handle_message(
        ClientMessage::Login {
            external_user_id: "spotify-user-bob".to_string(),
            display_name: Some("Bob".to_string()),
        },
        &state,
    )
    .await
    {
        ServerMessage::LoggedIn { account } => account,
        other => panic!("Expected LoggedIn, got {:?}", other),
    };

    submit(&state, &long_id, "Bob", "linkB", Some(&account.id)).await;
    let reply = submit(&state, &long_id, "Bobby", "linkC", Some(&account.id)).await;
    match reply {
        ServerMessage::SubmissionAccepted {
            display_name, link, ..
        } => {
            assert_eq!(display_name, "Bobby");
            assert_eq!(link, track_link("linkC"));
        }
        other => panic!("Expected SubmissionAccepted, got {:?}", other),
    }

    let subs = state.get_submissions(&long_id).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].account_id.as_deref(), Some(account.id.as_str()));
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;

    submit(&state, &long_id, "Bob", "linkB", None).await;
    let reply = submit(&state, &long_id, "Bob", "linkC", None).await;
    assert!(matches!(reply, ServerMessage::Error { code, .. } if code == "DUPLICATE_NAME"));

    let reply = submit(&state, &long_id, HOUSE_NAME, "linkC", None).await;
    assert!(matches!(reply, ServerMessage::Error { code, .. } if code == "RESERVED_NAME"));

    assert_eq!(state.get_submissions(&long_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_advance_twice_adds_one_house_entry() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Similar).await;
    submit(&state, &long_id, "Alice", "linkA", None).await;

    let (first, second) = tokio::join!(
        advance(&state, &long_id, RoundPhase::Listen),
        advance(&state, &long_id, RoundPhase::Listen)
    );
    assert_eq!(
        [first.advanced(), second.advanced()]
            .iter()
            .filter(|a| **a)
            .count(),
        1
    );

    let subs = state.get_submissions(&long_id).await.unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs.iter().filter(|s| s.is_house()).count(), 1);

    // Listen -> Listen again and Revealed -> anything are no-ops
    assert!(!advance(&state, &long_id, RoundPhase::Listen).await.advanced());
    assert!(advance(&state, &long_id, RoundPhase::Revealed).await.advanced());
    let outcome = advance(&state, &long_id, RoundPhase::Revealed).await;
    assert_eq!(
        outcome,
        AdvanceOutcome::Unchanged {
            phase: RoundPhase::Revealed
        }
    );
}

#[tokio::test]
async fn test_bad_guess_batch_writes_nothing() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;
    submit(&state, &long_id, "Alice", "linkA", None).await;
    submit(&state, &long_id, "Bob", "linkB", None).await;
    advance(&state, &long_id, RoundPhase::Listen).await;

    let reply = handle_message(
        ClientMessage::SubmitGuessText {
            long_id: long_id.clone(),
            guesser: "Bob".to_string(),
            text: "Alice: 0\nBob: 0\nsnoozin: 2".to_string(),
        },
        &state,
    )
    .await;
    match reply {
        ServerMessage::Error { code, msg } => {
            assert_eq!(code, "MALFORMED_GUESS");
            assert!(msg.contains("position 0"));
        }
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(state.guess_results(&long_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_playlist_after_auth() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;
    submit(&state, &long_id, "Alice", "linkA", None).await;
    advance(&state, &long_id, RoundPhase::Listen).await;
    let account = state.login_account("alice", None).await.unwrap();

    let reply = handle_message(
        ClientMessage::CreatePlaylist {
            long_id: long_id.clone(),
            account_id: account.id.clone(),
            name: "Rainy day".to_string(),
        },
        &state,
    )
    .await;
    let action_id = match reply {
        ServerMessage::AuthRequired { action_id } => action_id,
        other => panic!("Expected AuthRequired, got {:?}", other),
    };

    let reply = handle_message(
        ClientMessage::CompleteAuth {
            action_id,
            provider_token: "user-token".to_string(),
        },
        &state,
    )
    .await;
    match reply {
        ServerMessage::Resumed {
            result: ResumedAction::PlaylistCreated { long_id: id, link },
        } => {
            assert_eq!(id, long_id);
            assert_eq!(
                state.get_round(&long_id).await.unwrap().playlist_link,
                Some(link)
            );
        }
        other => panic!("Expected Resumed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submission_racing_advance_is_serialized() {
    let state = new_state();
    let long_id = create_round(&state, HouseStrategy::Random).await;
    submit(&state, &long_id, "Alice", "linkA", None).await;

    let (outcome, late) = tokio::join!(
        advance(&state, &long_id, RoundPhase::Listen),
        submit(&state, &long_id, "Carol", "linkC", None)
    );
    assert!(outcome.advanced());

    let expected = match late {
        ServerMessage::SubmissionAccepted { .. } => 3,
        ServerMessage::Error { code, .. } => {
            assert_eq!(code, "WRONG_PHASE");
            2
        }
        other => panic!("Expected SubmissionAccepted or Error, got {:?}", other),
    };

    // Whatever order won, every stored entry is part of the one shuffle
    let roster = state.get_ordered_roster(&long_id).await.unwrap();
    assert_eq!(roster.len(), expected);
    let subs = state.get_submissions(&long_id).await.unwrap();
    assert_eq!(subs.len(), expected);
    assert!(subs.iter().all(|s| s.shuffle_position.is_some()));
}
