use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::{export, merge};
use crate::state::AppState;
use crate::types::activity::Slot;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/merge", post(merge_slots))
}

#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct MergeRequest {
    session_id: String,
    /// Slot supplying coordinates, elevation and time.
    base: Slot,
    /// Slot supplying heart rate.
    hr_source: Slot,
}

async fn merge_slots(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let slots = state
        .slots(&req.session_id)
        .ok_or_else(|| AppError::NotFound(req.session_id.clone()))?;

    let (Some(base), Some(hr_source)) = (slots.get(req.base), slots.get(req.hr_source)) else {
        return Err(AppError::BadRequest(
            "Both files must be loaded before merging".to_string(),
        ));
    };

    tracing::info!(
        "Merging session {}: track from slot {}, heart rate from slot {}",
        req.session_id,
        req.base.as_str(),
        req.hr_source.as_str()
    );

    let merged = merge::merge(base, hr_source);
    let gpx = export::to_gpx(&merged);

    tracing::info!("Generated GPX: {} bytes", gpx.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export::GPX_MIME_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::MERGED_FILE_NAME),
            ),
        ],
        gpx,
    ))
}
