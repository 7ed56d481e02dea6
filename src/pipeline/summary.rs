use serde::{Deserialize, Serialize};

use crate::types::activity::{Activity, ActivityStats, FileFormat, Slot};

/// What the upload and session endpoints report about a loaded slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub name: String,
    pub label: String,
    pub device_name: Option<String>,
    pub format: FileFormat,
    pub point_count: usize,
    pub stats: ActivityStats,
    pub display: StatsDisplay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsDisplay {
    pub distance: String,
    pub duration: String,
    pub avg_pace: String,
    pub avg_heart_rate: String,
    pub avg_cadence: String,
}

pub fn summarize(slot: Slot, activity: &Activity) -> ActivitySummary {
    let stats = &activity.stats;
    ActivitySummary {
        name: activity.name.clone(),
        label: slot.label(Some(activity)),
        device_name: activity.device_name.clone(),
        format: activity.format,
        point_count: activity.points.len(),
        stats: stats.clone(),
        display: StatsDisplay {
            distance: format!("{:.2} km", stats.total_distance_km),
            duration: format_duration(stats.duration_seconds),
            avg_pace: match stats.avg_pace {
                Some(pace) => format!("{} /km", format_pace(pace)),
                None => "N/A".to_string(),
            },
            avg_heart_rate: stats
                .avg_heart_rate
                .map(|hr| format!("{} bpm", hr.round()))
                .unwrap_or_else(|| "N/A".to_string()),
            avg_cadence: stats
                .avg_cadence
                .map(|cad| format!("{} spm", cad.round()))
                .unwrap_or_else(|| "N/A".to_string()),
        },
    }
}

/// Seconds per kilometer as `m:ss`.
pub fn format_pace(seconds_per_km: f64) -> String {
    if !seconds_per_km.is_finite() {
        return "N/A".to_string();
    }
    let mut minutes = (seconds_per_km / 60.0).floor() as i64;
    let mut seconds = (seconds_per_km % 60.0).round() as i64;
    if seconds == 60 {
        minutes += 1;
        seconds = 0;
    }
    format!("{}:{:02}", minutes, seconds)
}

/// Parses `m:ss` or plain seconds.
pub fn parse_pace(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    match parts.as_slice() {
        [seconds] => seconds.trim().parse().ok(),
        [minutes, seconds] => {
            let minutes: u32 = minutes.trim().parse().ok()?;
            let seconds: u32 = seconds.trim().parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes.checked_mul(60)?.checked_add(seconds)
        }
        _ => None,
    }
}

pub fn format_duration(total_seconds: f64) -> String {
    if !total_seconds.is_finite() {
        return "00:00:00".to_string();
    }
    let total = total_seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
