use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::ControllerSettings;
use gateway::{RetryPolicy, DEFAULT_READ_RETRY_ATTEMPTS, DEFAULT_READ_RETRY_BASE_DELAY};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "campaign.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub load_timeout_ms: u64,
    pub read_retry_attempts: usize,
    pub read_retry_base_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/campaigns.db".into(),
            log_filter: "info".into(),
            load_timeout_ms: 10_000,
            read_retry_attempts: DEFAULT_READ_RETRY_ATTEMPTS,
            read_retry_base_delay_ms: DEFAULT_READ_RETRY_BASE_DELAY.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.read_retry_attempts.max(1),
            base_delay: Duration::from_millis(self.read_retry_base_delay_ms),
        }
    }
}

/// Keys accepted in `campaign.toml`; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    log_filter: Option<String>,
    load_timeout_ms: Option<u64>,
    read_retry_attempts: Option<usize>,
    read_retry_base_delay_ms: Option<u64>,
}

/// Defaults, then `campaign.toml` in the working directory, then `APP__*` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", file.display()))?;
        if let Some(v) = file_cfg.database_url {
            settings.database_url = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
        if let Some(v) = file_cfg.load_timeout_ms {
            settings.load_timeout_ms = v;
        }
        if let Some(v) = file_cfg.read_retry_attempts {
            settings.read_retry_attempts = v;
        }
        if let Some(v) = file_cfg.read_retry_base_delay_ms {
            settings.read_retry_base_delay_ms = v;
        }
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOAD_TIMEOUT_MS") {
        settings.load_timeout_ms = parse_env("APP__LOAD_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = env("APP__READ_RETRY_ATTEMPTS") {
        settings.read_retry_attempts = parse_env("APP__READ_RETRY_ATTEMPTS", &v)?;
    }
    if let Some(v) = env("APP__READ_RETRY_BASE_DELAY_MS") {
        settings.read_retry_base_delay_ms = parse_env("APP__READ_RETRY_BASE_DELAY_MS", &v)?;
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn parse_env<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got '{value}'"))
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
