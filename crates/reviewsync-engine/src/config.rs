use std::time::Duration;

const ENV_CONNECT_TIMEOUT_SECS: &str = "REVIEWSYNC_CONNECT_TIMEOUT_SECS";
const ENV_POLL_INTERVAL_SECS: &str = "REVIEWSYNC_POLL_INTERVAL_SECS";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_SEED_WINDOW_SECS: u64 = 45;
const DEFAULT_RECENT_UPDATE_WINDOW_MILLIS: i64 = 1_500;
const DEFAULT_NOTIFICATION_BUFFER: usize = 256;

/// Engine tunables.
///
/// The timeout, interval, and seeding window are heuristics with no
/// source-of-truth values; they are configuration, not contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long the live channel may take to open before falling back to
    /// polling.
    pub connect_timeout: Duration,
    /// Cadence of status requests while degraded to polling.
    pub poll_interval: Duration,
    /// Age limit on a `processing` review for optimistic placeholder
    /// seeding.
    pub optimistic_seed_window: Duration,
    /// How long a cell keeps its "just updated" highlight.
    pub recent_update_window_millis: i64,
    /// Capacity of the notification broadcast buffer.
    pub notification_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(
                parse_env_secs(ENV_CONNECT_TIMEOUT_SECS).unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            poll_interval: Duration::from_secs(
                parse_env_secs(ENV_POLL_INTERVAL_SECS).unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            optimistic_seed_window: Duration::from_secs(DEFAULT_SEED_WINDOW_SECS),
            recent_update_window_millis: DEFAULT_RECENT_UPDATE_WINDOW_MILLIS,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

fn parse_env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
