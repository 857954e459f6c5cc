use enginelink_common::time::Duration;

pub struct EngineEndpoints;

impl EngineEndpoints {
    pub const HISTORY: &'static str = "/history";
    pub const INTERRUPT: &'static str = "/interrupt";
    pub const PROMPT: &'static str = "/prompt";
    pub const QUEUE: &'static str = "/queue";
    pub const SYSTEM_STATS: &'static str = "/system_stats";
}

/// Marker field a compatible engine reports from `/system_stats`.
pub const SYSTEM_STATS_MARKER: &str = "system";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);
