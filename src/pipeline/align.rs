use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::activity::{Activity, TrackPoint};
use crate::types::comparison::AlignedSample;

#[derive(Clone, Copy)]
struct Sample {
    heart_rate: Option<u16>,
    pace: Option<f64>,
}

/// Resamples both activities onto one per-second timeline that starts at the
/// earlier of their first timestamps. Seconds without a sample stay empty;
/// nothing is interpolated.
pub fn align(a: Option<&Activity>, b: Option<&Activity>) -> Vec<AlignedSample> {
    let Some(window) = Window::of(a, b) else {
        return Vec::new();
    };
    let origin = window.origin;

    let by_second_a = samples_by_second(points(a), origin);
    let by_second_b = samples_by_second(points(b), origin);

    (0..=window.last_second)
        .map(|second| {
            let sample_a = by_second_a.get(&second);
            let sample_b = by_second_b.get(&second);
            AlignedSample {
                time: origin + Duration::seconds(second),
                hr_a: sample_a.and_then(|s| s.heart_rate),
                hr_b: sample_b.and_then(|s| s.heart_rate),
                pace_a: sample_a.and_then(|s| s.pace),
                pace_b: sample_b.and_then(|s| s.pace),
            }
        })
        .collect()
}

/// Number of samples `align` would produce, without building them.
pub fn timeline_len(a: Option<&Activity>, b: Option<&Activity>) -> usize {
    Window::of(a, b)
        .map(|w| usize::try_from(w.last_second).unwrap_or(usize::MAX).saturating_add(1))
        .unwrap_or(0)
}

struct Window {
    origin: DateTime<Utc>,
    last_second: i64,
}

impl Window {
    fn of(a: Option<&Activity>, b: Option<&Activity>) -> Option<Self> {
        let start_a = a.and_then(Activity::start_time);
        let start_b = b.and_then(Activity::start_time);
        let origin = match (start_a, start_b) {
            (Some(ta), Some(tb)) => ta.min(tb),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => return None,
        };

        let end = elapsed_end(a, origin).max(elapsed_end(b, origin));
        Some(Self {
            origin,
            last_second: end.ceil().max(0.0) as i64,
        })
    }
}

fn points(activity: Option<&Activity>) -> &[TrackPoint] {
    activity.map(|act| act.points.as_slice()).unwrap_or_default()
}

fn elapsed_seconds(time: DateTime<Utc>, origin: DateTime<Utc>) -> f64 {
    (time - origin).num_milliseconds() as f64 / 1000.0
}

/// Later points landing on the same second replace earlier ones.
fn samples_by_second(points: &[TrackPoint], origin: DateTime<Utc>) -> HashMap<i64, Sample> {
    points
        .iter()
        .map(|p| {
            let second = elapsed_seconds(p.time, origin).round() as i64;
            let sample = Sample {
                heart_rate: p.heart_rate,
                pace: p.pace,
            };
            (second, sample)
        })
        .collect()
}

fn elapsed_end(activity: Option<&Activity>, origin: DateTime<Utc>) -> f64 {
    activity
        .and_then(Activity::end_time)
        .map(|end| elapsed_seconds(end, origin))
        .unwrap_or(0.0)
}
