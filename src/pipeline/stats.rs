use crate::types::activity::{ActivityStats, TrackPoint};

/// Running totals carried from one track point to the next while a parser
/// builds its point list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackAccumulator {
    pub distance_km: f64,
    pub cadence_sum: u64,
    pub cadence_count: u64,
}

impl TrackAccumulator {
    pub fn avg_cadence(&self) -> Option<f64> {
        if self.cadence_count > 0 {
            Some(self.cadence_sum as f64 / self.cadence_count as f64)
        } else {
            None
        }
    }
}

pub fn summarize(points: &[TrackPoint], acc: &TrackAccumulator) -> ActivityStats {
    let total_distance_km = acc.distance_km;
    let duration_seconds = match (points.first(), points.last()) {
        (Some(first), Some(last)) => seconds_between(first, last),
        _ => 0.0,
    };

    let avg_pace = if total_distance_km > 0.0 && duration_seconds > 0.0 {
        Some(duration_seconds / total_distance_km)
    } else {
        None
    };

    ActivityStats {
        total_distance_km,
        duration_seconds,
        avg_heart_rate: average_heart_rate(points),
        avg_pace,
        avg_cadence: acc.avg_cadence(),
    }
}

pub fn average_heart_rate(points: &[TrackPoint]) -> Option<f64> {
    let mut hr_sum = 0u64;
    let mut hr_count = 0u64;

    for hr in points.iter().filter_map(|p| p.heart_rate) {
        hr_sum += hr as u64;
        hr_count += 1;
    }

    if hr_count > 0 {
        Some(hr_sum as f64 / hr_count as f64)
    } else {
        None
    }
}

/// Signed seconds from `from` to `to`, millisecond precision.
pub fn seconds_between(from: &TrackPoint, to: &TrackPoint) -> f64 {
    (to.time - from.time).num_milliseconds() as f64 / 1000.0
}
