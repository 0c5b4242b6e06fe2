/// Server configuration for the back-office node
///
/// # Environment variables
///
/// All settings can be overridden through the environment:
///
/// | Variable | Default | Purpose |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/atelier | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | PUBLIC_BASE_URL | https://www.example.com | Base for confirmation/payment links |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | EMAIL_API_URL | (empty) | Email provider endpoint; empty = discard |
/// | EMAIL_FROM | orders@example.com | From address |
/// | EMAIL_TIMEOUT_MS | 10000 | Provider call timeout |
/// | EMAIL_API_KEY | (empty) | Static provider API key |
/// | EMAIL_TOKEN_URL | (empty) | Token endpoint for refreshed credentials |
/// | EMAIL_CLIENT_SECRET | (empty) | Secret for the token endpoint |
/// | STATUS_EMAIL_INTERVAL_SECS | 900 | Scheduler tick period |
/// | REMINDER_INTERVAL_HOURS | 72 | Minimum gap between reminders |
/// | INVOICED_MIN_DELAY_MINS | 15 | First INVOICED email delay guard |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Graceful shutdown window |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/atelier HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the embedded database and logs
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Base URL stamped into customer-facing links
    pub public_base_url: String,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Email ===
    /// Provider endpoint; when empty the NoopMailer is wired instead
    pub email_api_url: String,
    /// From address
    pub email_from: String,
    /// Provider call timeout (milliseconds)
    pub email_timeout_ms: u64,
    /// Static API key for the provider (bearer header)
    pub email_api_key: String,
    /// Token endpoint for short-lived access tokens; overrides the static key
    pub email_token_url: String,
    /// Secret exchanged at the token endpoint
    pub email_client_secret: String,

    // === Scheduler ===
    /// Status email sweep period (seconds)
    pub status_email_interval_secs: u64,
    /// Minimum gap between reminder sends (hours)
    pub reminder_interval_hours: u64,
    /// First INVOICED email waits at least this long (minutes)
    pub invoiced_min_delay_mins: u64,

    /// Graceful shutdown window (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, with defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/atelier".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "https://www.example.com".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            email_api_url: std::env::var("EMAIL_API_URL").unwrap_or_default(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@example.com".into()),
            email_timeout_ms: env_parse("EMAIL_TIMEOUT_MS", 10_000),
            email_api_key: std::env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_token_url: std::env::var("EMAIL_TOKEN_URL").unwrap_or_default(),
            email_client_secret: std::env::var("EMAIL_CLIENT_SECRET").unwrap_or_default(),
            status_email_interval_secs: env_parse("STATUS_EMAIL_INTERVAL_SECS", 900),
            reminder_interval_hours: env_parse("REMINDER_INTERVAL_HOURS", 72),
            invoiced_min_delay_mins: env_parse("INVOICED_MIN_DELAY_MINS", 15),
            shutdown_timeout_ms: env_parse("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// Override the parts tests care about
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
