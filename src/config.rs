use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 15_000;

/// Debounce window per save kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveWindows {
    pub scores: Duration,
    pub exam_scores: Duration,
    pub qualitative: Duration,
    pub attendance: Duration,
    pub unit_hours: Duration,
    pub unit_exam_scores: Duration,
}

impl Default for SaveWindows {
    fn default() -> Self {
        Self {
            scores: Duration::from_millis(500),
            exam_scores: Duration::from_millis(500),
            qualitative: Duration::from_millis(800),
            attendance: Duration::from_millis(800),
            unit_hours: Duration::from_millis(200),
            unit_exam_scores: Duration::from_millis(500),
        }
    }
}

impl SaveWindows {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            scores: env_millis("PLANBOOK_DEBOUNCE_SCORES_MS").unwrap_or(d.scores),
            exam_scores: env_millis("PLANBOOK_DEBOUNCE_EXAM_SCORES_MS").unwrap_or(d.exam_scores),
            qualitative: env_millis("PLANBOOK_DEBOUNCE_QUALITATIVE_MS").unwrap_or(d.qualitative),
            attendance: env_millis("PLANBOOK_DEBOUNCE_ATTENDANCE_MS").unwrap_or(d.attendance),
            unit_hours: env_millis("PLANBOOK_DEBOUNCE_UNIT_HOURS_MS").unwrap_or(d.unit_hours),
            unit_exam_scores: env_millis("PLANBOOK_DEBOUNCE_UNIT_EXAM_SCORES_MS")
                .unwrap_or(d.unit_exam_scores),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: Option<String>,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub http_timeout: Duration,
    pub log_filter: String,
    pub save_windows: SaveWindows,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            csrf_token: None,
            session_cookie: None,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            log_filter: "info".to_string(),
            save_windows: SaveWindows::default(),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the `PLANBOOK_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let log_filter = std::env::var("PLANBOOK_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            server_url: env_non_empty("PLANBOOK_SERVER_URL").map(|s| normalize_base_url(&s)),
            csrf_token: env_non_empty("PLANBOOK_CSRF_TOKEN"),
            session_cookie: env_non_empty("PLANBOOK_SESSION_COOKIE"),
            http_timeout: env_millis("PLANBOOK_HTTP_TIMEOUT_MS")
                .unwrap_or(Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS)),
            log_filter,
            save_windows: SaveWindows::from_env(),
        }
    }
}

/// Trims whitespace and trailing slashes so paths can be appended verbatim.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_non_empty(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
