use std::collections::HashMap;

use crate::pipeline::stats;
use crate::types::activity::{Activity, ActivityStats, TrackPoint};

pub const MERGED_NAME_SUFFIX: &str = " (Merged)";

/// Builds a new activity from `base`'s track with heart rate taken from
/// `hr_source` wherever the two share a timestamp string exactly.
///
/// Only the average heart rate is recomputed. Distance, duration, pace and
/// cadence statistics are carried over from `base` unchanged.
pub fn merge(base: &Activity, hr_source: &Activity) -> Activity {
    let hr_by_time: HashMap<&str, Option<u16>> = hr_source
        .points
        .iter()
        .map(|p| (p.time_text.as_str(), p.heart_rate))
        .collect();

    let points: Vec<TrackPoint> = base
        .points
        .iter()
        .map(|p| TrackPoint {
            heart_rate: match hr_by_time.get(p.time_text.as_str()) {
                Some(hr) => *hr,
                None => p.heart_rate,
            },
            ..p.clone()
        })
        .collect();

    let matched = base
        .points
        .iter()
        .filter(|p| hr_by_time.contains_key(p.time_text.as_str()))
        .count();
    tracing::info!(
        "Merged heart rate into '{}': {} of {} points matched",
        base.name,
        matched,
        base.points.len()
    );

    let stats = ActivityStats {
        avg_heart_rate: stats::average_heart_rate(&points),
        ..base.stats.clone()
    };

    Activity {
        name: format!("{}{}", base.name, MERGED_NAME_SUFFIX),
        device_name: base.device_name.clone(),
        format: base.format,
        points,
        stats,
    }
}
