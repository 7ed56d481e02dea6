use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: DateTime<Utc>,
    /// Timestamp exactly as it appeared in the source file. Merges match on this.
    pub time_text: String,
    pub heart_rate: Option<u16>,
    /// Steps per minute.
    pub cadence: Option<u16>,
    /// Cumulative distance from the first point.
    pub distance_km: f64,
    /// Seconds per kilometer over the interval ending at this point.
    pub pace: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Gpx,
    Tcx,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Gpx => "gpx",
            FileFormat::Tcx => "tcx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_distance_km: f64,
    pub duration_seconds: f64,
    pub avg_heart_rate: Option<f64>,
    /// Seconds per kilometer over the whole activity, not a mean of point paces.
    pub avg_pace: Option<f64>,
    pub avg_cadence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub device_name: Option<String>,
    pub format: FileFormat,
    pub points: Vec<TrackPoint>,
    pub stats: ActivityStats,
}

impl Activity {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.time)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.time)
    }
}

/// One of the two upload positions a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "a" => Some(Slot::A),
            "b" => Some(Slot::B),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::A => "a",
            Slot::B => "b",
        }
    }

    /// Label shown next to a slot's series: the recording device when known.
    pub fn label(&self, activity: Option<&Activity>) -> String {
        activity
            .and_then(|a| a.device_name.as_deref())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.as_str().to_uppercase())
    }
}
