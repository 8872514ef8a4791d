//! services/bot/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// The only identity allowed to run admin commands. Also receives new-feedback notices.
    pub admin_chat_id: i64,
    pub feedback_path: PathBuf,
    pub employees_path: PathBuf,
    pub log_level: Level,
    pub telegram_api_url: String,
    pub poll_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Required Bot Settings ---
        let bot_token = std::env::var("BOT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("BOT_TOKEN".to_string()))?;

        let admin_chat_id_str = std::env::var("ADMIN_CHAT_ID")
            .map_err(|_| ConfigError::MissingVar("ADMIN_CHAT_ID".to_string()))?;
        let admin_chat_id = admin_chat_id_str.trim().parse::<i64>().map_err(|_| {
            ConfigError::InvalidValue(
                "ADMIN_CHAT_ID".to_string(),
                format!("'{}' is not an integer", admin_chat_id_str),
            )
        })?;

        // --- Storage Locations ---
        let feedback_path = std::env::var("FEEDBACK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("feedback.json"));
        let employees_path = std::env::var("EMPLOYEES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("employees.csv"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Transport Settings ---
        let telegram_api_url = std::env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_timeout_str =
            std::env::var("POLL_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let poll_timeout_secs = poll_timeout_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("POLL_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            bot_token,
            admin_chat_id,
            feedback_path,
            employees_path,
            log_level,
            telegram_api_url,
            poll_timeout_secs,
        })
    }
}
