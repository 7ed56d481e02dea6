use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_file_size: usize,
    pub session_ttl: Duration,
    /// Pace smoothing window used by the comparison endpoint when the request
    /// does not pick one.
    pub default_smoothing_window: usize,
    /// Longest comparison timeline, in one-second samples.
    pub max_timeline_seconds: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let max_file_size_mb = std::env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(25);

        let session_ttl_seconds = std::env::var("SESSION_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let default_smoothing_window = std::env::var("DEFAULT_SMOOTHING_WINDOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let max_timeline_seconds = std::env::var("MAX_TIMELINE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3 * 24 * 3600);

        Self {
            port,
            max_file_size: max_file_size_mb * 1024 * 1024,
            session_ttl: Duration::from_secs(session_ttl_seconds),
            default_smoothing_window,
            max_timeline_seconds,
        }
    }
}
