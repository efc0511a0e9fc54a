use std::env;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path for personalities, outcomes and weight history.
    pub database_path: String,
    /// Check interval used for traders registered without a stored personality.
    pub default_check_interval_secs: u64,
    /// Default number of weight-history entries returned by the CLI.
    pub history_limit: usize,
    /// Personality preset applied to traders seen for the first time.
    pub default_preset: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            database_path: env::var("CONFLUENCE_DB_PATH")
                .unwrap_or_else(|_| "confluence.db".to_string()),
            default_check_interval_secs: env::var("CONFLUENCE_DEFAULT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            history_limit: env::var("CONFLUENCE_HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            default_preset: env::var("CONFLUENCE_DEFAULT_PRESET")
                .unwrap_or_else(|_| "balanced".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "confluence.db".to_string(),
            default_check_interval_secs: 300,
            history_limit: 20,
            default_preset: "balanced".to_string(),
        }
    }
}
