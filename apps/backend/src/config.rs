//! Service configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.wanikani.com/v2";
pub const DEFAULT_API_REVISION: &str = "20170710";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://wanikani.db?mode=rwc";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer token for the WaniKani API. Upstream calls fail without it.
    pub api_token: Option<String>,
    pub api_url: String,
    pub api_revision: String,
    pub database_url: String,
    /// Pause between consecutive detail fetches in a batch.
    pub detail_fetch_delay: Duration,
    /// Maximum subject ids per assignment lookup request.
    pub assignment_chunk_size: usize,
    pub request_timeout: Duration,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            api_revision: DEFAULT_API_REVISION.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            detail_fetch_delay: Duration::from_millis(200),
            assignment_chunk_size: 1000,
            request_timeout: Duration::from_secs(30),
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_token = lookup("WANIKANI_API_TOKEN").filter(|t| !t.trim().is_empty());
        let api_url = lookup("WANIKANI_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        let api_revision = lookup("WANIKANI_REVISION").unwrap_or(defaults.api_revision);
        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let detail_fetch_delay = match lookup("DETAIL_FETCH_DELAY_MS") {
            Some(v) => Duration::from_millis(parse("DETAIL_FETCH_DELAY_MS", &v)?),
            None => defaults.detail_fetch_delay,
        };
        let assignment_chunk_size = match lookup("ASSIGNMENT_CHUNK_SIZE") {
            Some(v) => match parse::<usize>("ASSIGNMENT_CHUNK_SIZE", &v)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: "ASSIGNMENT_CHUNK_SIZE",
                        value: v,
                    })
                }
                n => n,
            },
            None => defaults.assignment_chunk_size,
        };
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", &v)?),
            None => defaults.request_timeout,
        };
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = match lookup("PORT") {
            Some(v) => parse("PORT", &v)?,
            None => defaults.port,
        };

        Ok(Self {
            api_token,
            api_url,
            api_revision,
            database_url,
            detail_fetch_delay,
            assignment_chunk_size,
            request_timeout,
            host,
            port,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
