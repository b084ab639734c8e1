//! Global application configuration.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton holding
//! runtime configuration loaded from environment variables (optionally via a
//! `.env` file). Module-level accessor functions are provided for the values
//! other crates read frequently.

use once_cell::sync::OnceCell;
use std::env;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_path: String,
    /// Root directory holding exercise submission material.
    pub storage_root: String,
    /// Root directory where working copies are checked out for analysis.
    pub clone_root: String,
    pub moss_user_id: String,
    pub moss_server: String,
    pub moss_port: u16,
    /// Hard timeout for a single external tool run (upload + report fetch).
    pub tool_timeout_secs: u64,
    /// Upper bound on stored comparisons per result.
    pub max_comparisons: usize,
    /// Concurrent working-copy downloads per analysis.
    pub download_concurrency: usize,
    /// Delay before downloaded working copies are removed after a run.
    pub repo_cleanup_delay_secs: u64,
    /// Delay before generated report artifacts are removed.
    pub report_cleanup_delay_secs: u64,
    /// Hours between continuous control passes.
    pub check_interval_hours: u64,
    /// Link included in student-facing plagiarism posts.
    pub conduct_policy_url: String,
}

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env_or("APP_ENV", "development"),
            project_name: env_or("PROJECT_NAME", "crosscheck"),
            log_level: env_or("LOG_LEVEL", "info"),
            log_file: env_or("LOG_FILE", "logs/crosscheck.log"),
            database_path: env_or("DATABASE_PATH", "data/crosscheck.db"),
            storage_root: env_or("STORAGE_ROOT", "data/storage"),
            clone_root: env_or("CLONE_ROOT", "data/clones"),
            moss_user_id: env_or("MOSS_USER_ID", ""),
            moss_server: env_or("MOSS_SERVER", "moss.stanford.edu"),
            moss_port: env_parse("MOSS_PORT", 7690),
            tool_timeout_secs: env_parse("TOOL_TIMEOUT_SECS", 3600),
            max_comparisons: env_parse("MAX_COMPARISONS", 500),
            download_concurrency: env_parse("DOWNLOAD_CONCURRENCY", 8),
            repo_cleanup_delay_secs: env_parse("REPO_CLEANUP_DELAY_SECS", 10),
            report_cleanup_delay_secs: env_parse("REPORT_CLEANUP_DELAY_SECS", 60),
            check_interval_hours: env_parse("CHECK_INTERVAL_HOURS", 24),
            conduct_policy_url: env_or(
                "CONDUCT_POLICY_URL",
                "https://example.org/academic-integrity",
            ),
        }
    }

    /// Returns the global configuration, loading it on first access.
    pub fn global() -> &'static Self {
        CONFIG.get_or_init(AppConfig::from_env)
    }
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn storage_root() -> String {
    AppConfig::global().storage_root.clone()
}

pub fn clone_root() -> String {
    AppConfig::global().clone_root.clone()
}
