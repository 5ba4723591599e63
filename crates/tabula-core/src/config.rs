use std::time::Duration;

use crate::error::AppError;

/// Runtime settings shared by the fetcher and the polling front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// How often the control path checks for a finished job.
    pub poll_interval: Duration,
    /// Whole-request timeout for the page fetch.
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            fetch_timeout: Duration::from_secs(30),
            user_agent: "Tabula/0.1 (Column Scraper)".to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `TABULA_POLL_INTERVAL_MS` (optional, defaults to 100)
    /// - `TABULA_FETCH_TIMEOUT_SECS` (optional, defaults to 30)
    /// - `TABULA_USER_AGENT` (optional)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("TABULA_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse_positive(
                "TABULA_POLL_INTERVAL_MS",
                &raw,
            )?);
        }
        if let Some(raw) = lookup("TABULA_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(parse_positive(
                "TABULA_FETCH_TIMEOUT_SECS",
                &raw,
            )?);
        }
        if let Some(agent) = lookup("TABULA_USER_AGENT") {
            if agent.trim().is_empty() {
                return Err(AppError::ConfigError(
                    "TABULA_USER_AGENT must not be empty".into(),
                ));
            }
            config.user_agent = agent;
        }

        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, AppError> {
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(parsed)
}
