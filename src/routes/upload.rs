use axum::extract::Multipart;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::parse;
use crate::pipeline::summary::{self, ActivitySummary};
use crate::state::AppState;
use crate::types::activity::{Activity, Slot};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/upload", post(upload))
}

#[derive(Serialize, Deserialize)]
struct UploadResponse {
    session_id: String,
    slot: Slot,
    activity: ActivitySummary,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut slot: Option<String> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                file_bytes = Some(bytes.to_vec());
            }
            "slot" | "session_id" => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                if name == "slot" {
                    slot = Some(value);
                } else if !value.trim().is_empty() {
                    session_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let slot = slot.ok_or_else(|| AppError::BadRequest("No slot provided".to_string()))?;
    let slot = Slot::from_str(&slot)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid slot: {}. Use 'a' or 'b'", slot)))?;
    let bytes = file_bytes.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let filename = filename.ok_or_else(|| AppError::BadRequest("No filename provided".to_string()))?;

    if let Some(id) = session_id.as_deref() {
        if !state.contains(id) {
            return Err(AppError::NotFound(id.to_string()));
        }
    }

    tracing::info!("Parsing {} into slot {}", filename, slot.as_str());

    let activity = match read_activity(bytes, &filename) {
        Ok(activity) => activity,
        Err(err) => {
            // A failed upload empties its own slot and leaves the other alone.
            if let Some(id) = session_id.as_deref() {
                state.set_slot(id, slot, None);
            }
            tracing::warn!("Rejected {} for slot {}: {}", filename, slot.as_str(), err);
            return Err(err);
        }
    };

    // New sessions are only created for uploads that parsed.
    let session_id = session_id.unwrap_or_else(|| state.create_session());

    let summary = summary::summarize(slot, &activity);
    if !state.set_slot(&session_id, slot, Some(activity)) {
        return Err(AppError::NotFound(session_id));
    }

    tracing::info!(
        "Loaded {} into slot {} ({} points, {:.2} km)",
        filename,
        slot.as_str(),
        summary.point_count,
        summary.stats.total_distance_km
    );

    Ok(Json(UploadResponse {
        session_id,
        slot,
        activity: summary,
    }))
}

fn read_activity(bytes: Vec<u8>, filename: &str) -> Result<Activity, AppError> {
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest("File is not valid UTF-8 text".to_string()))?;
    Ok(parse::parse(&text, filename)?)
}
