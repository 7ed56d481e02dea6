use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::summary::{self, ActivitySummary};
use crate::state::{AppState, SessionSlots};
use crate::types::activity::Slot;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:session_id", get(session))
}

#[derive(Serialize, Deserialize)]
struct SessionResponse {
    session_id: String,
    a: Option<ActivitySummary>,
    b: Option<ActivitySummary>,
}

impl SessionResponse {
    fn new(session_id: String, slots: &SessionSlots) -> Self {
        Self {
            session_id,
            a: slots.get(Slot::A).map(|act| summary::summarize(Slot::A, act)),
            b: slots.get(Slot::B).map(|act| summary::summarize(Slot::B, act)),
        }
    }
}

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session_id = state.create_session();
    tracing::info!("Created session {}", session_id);
    Json(SessionResponse::new(session_id, &SessionSlots::default()))
}

async fn session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let slots = state
        .slots(&session_id)
        .ok_or_else(|| AppError::NotFound(session_id.clone()))?;

    Ok(Json(SessionResponse::new(session_id, &slots)))
}
