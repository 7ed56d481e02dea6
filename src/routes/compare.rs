use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::{align, smooth, summary};
use crate::state::AppState;
use crate::types::activity::Slot;
use crate::types::comparison::AlignedSample;

const MAX_SMOOTHING_WINDOW: usize = 21;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/compare", post(compare))
}

#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CompareRequest {
    session_id: String,
    smoothing: Option<usize>,
    /// Slow end of the pace axis, `m:ss`.
    pace_min: Option<String>,
    /// Fast end of the pace axis, `m:ss`.
    pace_max: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct PaceAxis {
    slowest: u32,
    fastest: u32,
}

#[derive(Serialize, Deserialize)]
struct CompareResponse {
    label_a: String,
    label_b: String,
    smoothing: usize,
    pace_axis: Option<PaceAxis>,
    samples: Vec<AlignedSample>,
}

fn validate_smoothing(window: usize) -> Result<usize, AppError> {
    if window == 0 || window > MAX_SMOOTHING_WINDOW || window % 2 == 0 {
        return Err(AppError::BadRequest(format!(
            "Invalid smoothing: {}. Use an odd window between 1 and {}",
            window, MAX_SMOOTHING_WINDOW
        )));
    }
    Ok(window)
}

fn pace_axis(req: &CompareRequest) -> Result<Option<PaceAxis>, AppError> {
    let parse_bound = |text: &str| {
        summary::parse_pace(text)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid pace: {}. Use m:ss", text)))
    };

    match (req.pace_min.as_deref(), req.pace_max.as_deref()) {
        (Some(slowest), Some(fastest)) => Ok(Some(PaceAxis {
            slowest: parse_bound(slowest)?,
            fastest: parse_bound(fastest)?,
        })),
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "Both pace_min and pace_max must be provided together".to_string(),
        )),
    }
}

async fn compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    let slots = state
        .slots(&req.session_id)
        .ok_or_else(|| AppError::NotFound(req.session_id.clone()))?;

    let window = validate_smoothing(req.smoothing.unwrap_or(state.config.default_smoothing_window))?;
    let pace_axis = pace_axis(&req)?;

    let a = slots.get(Slot::A);
    let b = slots.get(Slot::B);
    let span = align::timeline_len(a, b);
    if span > state.config.max_timeline_seconds {
        return Err(AppError::BadRequest(format!(
            "Recordings span {} seconds, more than the {} second comparison limit",
            span, state.config.max_timeline_seconds
        )));
    }
    let mut samples = align::align(a, b);

    let pace_a: Vec<Option<f64>> = samples.iter().map(|s| s.pace_a).collect();
    let pace_b: Vec<Option<f64>> = samples.iter().map(|s| s.pace_b).collect();
    let smoothed_a = smooth::smooth(&pace_a, window);
    let smoothed_b = smooth::smooth(&pace_b, window);
    for ((sample, pa), pb) in samples.iter_mut().zip(smoothed_a).zip(smoothed_b) {
        sample.pace_a = pa;
        sample.pace_b = pb;
    }

    tracing::info!(
        "Aligned session {}: {} seconds, smoothing window {}",
        req.session_id,
        samples.len(),
        window
    );

    Ok(Json(CompareResponse {
        label_a: Slot::A.label(a),
        label_b: Slot::B.label(b),
        smoothing: window,
        pace_axis,
        samples,
    }))
}
