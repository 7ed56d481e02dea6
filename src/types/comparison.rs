use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One second of the shared comparison timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSample {
    pub time: DateTime<Utc>,
    pub hr_a: Option<u16>,
    pub hr_b: Option<u16>,
    pub pace_a: Option<f64>,
    pub pace_b: Option<f64>,
}
