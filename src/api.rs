//! HTTP API endpoints.
//!
//! `POST /api/messages` carries the JSON message protocol, round views are
//! readable by link, and state export/import sits behind admin auth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{admin_auth_middleware, AdminAuthConfig};
use crate::handlers::{error_reply, handle_message};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, StoreSnapshot};
use crate::types::AccountId;

/// Build the API router
pub fn router(state: Arc<AppState>, auth_config: Arc<AdminAuthConfig>) -> Router {
    let admin_routes = Router::new()
        .route("/api/state/export", get(export_state))
        .route("/api/state/import", post(import_state))
        .layer(middleware::from_fn_with_state(
            auth_config,
            admin_auth_middleware,
        ));

    Router::new()
        .route("/api/messages", post(post_message))
        .route("/api/rounds/{long_id}", get(get_round))
        .merge(admin_routes)
        .with_state(state)
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "ROUND_NOT_FOUND" | "ACCOUNT_NOT_FOUND" | "PENDING_ACTION_NOT_FOUND" => {
            StatusCode::NOT_FOUND
        }
        "PROVIDER_ERROR" | "HOUSE_REC_EXHAUSTED" | "INSUFFICIENT_SEEDS" => StatusCode::BAD_GATEWAY,
        "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn reply_response(reply: ServerMessage) -> Response {
    let status = match &reply {
        ServerMessage::Error { code, .. } => status_for_code(code),
        ServerMessage::AuthRequired { .. } => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    };
    (status, Json(reply)).into_response()
}

/// Dispatch one protocol message.
///
/// POST /api/messages
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(msg): Json<ClientMessage>,
) -> Response {
    reply_response(handle_message(msg, &state).await)
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub account_id: Option<AccountId>,
}

/// The phase-dependent view of a round.
///
/// GET /api/rounds/{long_id}?account_id=..
pub async fn get_round(
    State(state): State<Arc<AppState>>,
    Path(long_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    match state.get_view(&long_id, query.account_id.as_deref()).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => reply_response(error_reply(e)),
    }
}

/// Export the entire store as JSON.
///
/// GET /api/state/export
pub async fn export_state(State(state): State<Arc<AppState>>) -> Json<StoreSnapshot> {
    Json(state.export_state().await)
}

/// Replace all state with a snapshot.
///
/// POST /api/state/import
pub async fn import_state(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<StoreSnapshot>,
) -> Response {
    match state.import_state(snapshot).await {
        Ok(()) => {
            // Jobs of the old state point at rounds that may be gone
            state.cancel_all_jobs();
            let restored = state.restore_schedules().await;
            (
                StatusCode::OK,
                format!("State imported successfully ({} schedules restored)", restored),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("State import failed: {}", e);
            (StatusCode::BAD_REQUEST, format!("Import failed: {}", e)).into_response()
        }
    }
}
