//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the fixed
//! operational constants of the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Groq API key, used for chat completion and speech synthesis
    pub groq_api_key: String,

    /// Display name the bot introduces itself with
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Creator name shown in the welcome and stats messages
    #[serde(default = "default_creator_name")]
    pub creator_name: String,

    /// Port the health-check HTTP listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chat completion model identifier
    #[serde(default = "default_groq_model")]
    pub groq_model: String,

    /// Override for the system preamble sent with every completion
    pub system_message: Option<String>,

    /// Directory for generated media files; defaults to the OS temp dir
    pub media_dir: Option<String>,
}

fn default_assistant_name() -> String {
    "ATLAS".to_string()
}

fn default_creator_name() -> String {
    "the ATLAS team".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required credential
    /// (`TELEGRAM_TOKEN`, `GROQ_API_KEY`) is absent.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Directory where generated media files are placed
    #[must_use]
    pub fn media_dir(&self) -> std::path::PathBuf {
        self.media_dir
            .as_ref()
            .map_or_else(std::env::temp_dir, std::path::PathBuf::from)
    }
}

/// Number of stored history entries forwarded with a completion request
pub const HISTORY_WINDOW: usize = 8;

/// Maximum outbound message length before splitting into parts
pub const MESSAGE_LIMIT: usize = 4000;

/// Server-side wait for the long-poll `getUpdates` call
pub const POLL_WAIT_SECS: u64 = 30;

/// Client-side timeout for the long-poll call; must exceed `POLL_WAIT_SECS`
pub const POLL_HTTP_TIMEOUT_SECS: u64 = 35;

/// Timeout for ordinary Telegram send calls
pub const TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// Timeout for chat completion requests
pub const COMPLETION_TIMEOUT_SECS: u64 = 60;

/// Timeout for speech synthesis requests
pub const MEDIA_TIMEOUT_SECS: u64 = 30;

/// Sleep after a transient polling error before the next attempt
pub const ERROR_BACKOFF_SECS: u64 = 5;

/// Pause between consecutive outbound sends (message parts, report files)
pub const SEND_PAUSE_MS: u64 = 1000;

/// Maximum tokens requested per completion
pub const COMPLETION_MAX_TOKENS: u32 = 3000;

/// Sampling temperature for completions
pub const COMPLETION_TEMPERATURE: f32 = 0.7;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Tests run sequentially to avoid environment variable race conditions
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("GROQ_API_KEY", "dummy_key");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.groq_api_key, "dummy_key");

        // Defaults applied when unset
        assert_eq!(settings.assistant_name, "ATLAS");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.groq_model, "llama-3.3-70b-versatile");
        assert!(settings.system_message.is_none());

        env::remove_var("TELEGRAM_TOKEN");
        env::remove_var("GROQ_API_KEY");
        Ok(())
    }

    #[test]
    fn test_media_dir_fallback() {
        let settings = Settings {
            telegram_token: "dummy".to_string(),
            groq_api_key: "dummy".to_string(),
            assistant_name: default_assistant_name(),
            creator_name: default_creator_name(),
            port: default_port(),
            groq_model: default_groq_model(),
            system_message: None,
            media_dir: None,
        };
        assert_eq!(settings.media_dir(), std::env::temp_dir());

        let settings = Settings {
            media_dir: Some("/var/media".to_string()),
            ..settings
        };
        assert_eq!(settings.media_dir(), std::path::PathBuf::from("/var/media"));
    }
}
