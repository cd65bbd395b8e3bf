// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Credentials and endpoints for the hosted services a call uses.
//!
//! Nothing is read implicitly. The host calls [`AgentConfig::from_env`] or
//! [`AgentConfig::load_dotenv`] once at startup.

use crate::transports::daily::DEFAULT_API_URL;
use crate::transports::DailyTransport;

pub const DAILY_API_KEY: &str = "DAILY_API_KEY";
pub const DAILY_API_URL: &str = "DAILY_API_URL";
pub const ELEVEN_LABS_API_KEY: &str = "ELEVEN_LABS_API_KEY";
pub const ELEVEN_LABS_VOICE_ID: &str = "ELEVEN_LABS_VOICE_ID";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const GOOGLE_MODEL: &str = "GOOGLE_MODEL";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing or empty")]
    Missing(&'static str),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub daily_api_key: String,
    pub daily_api_url: String,
    pub eleven_labs_api_key: String,
    /// Empty selects the service default voice.
    pub eleven_labs_voice_id: String,
    pub google_api_key: String,
    /// Empty selects the service default model.
    pub google_model: String,
    pub bot_name: String,
}

impl AgentConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load `.env` (overriding variables already set) then read the
    /// environment. A missing `.env` is not an error.
    pub fn load_dotenv() -> Result<Self, ConfigError> {
        match dotenvy::dotenv_override() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => tracing::debug!("no .env file found"),
            Err(e) => tracing::warn!(error = %e, "failed to load .env"),
        }
        Self::from_env()
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            daily_api_key: required(DAILY_API_KEY)?,
            daily_api_url: optional(DAILY_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            eleven_labs_api_key: required(ELEVEN_LABS_API_KEY)?,
            eleven_labs_voice_id: optional(ELEVEN_LABS_VOICE_ID).unwrap_or_default(),
            google_api_key: required(GOOGLE_API_KEY)?,
            google_model: optional(GOOGLE_MODEL).unwrap_or_default(),
            bot_name: DailyTransport::DEFAULT_BOT_NAME.to_string(),
        })
    }

    pub fn with_bot_name(mut self, bot_name: impl Into<String>) -> Self {
        self.bot_name = bot_name.into();
        self
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("daily_api_url", &self.daily_api_url)
            .field("eleven_labs_voice_id", &self.eleven_labs_voice_id)
            .field("google_model", &self.google_model)
            .field("bot_name", &self.bot_name)
            .finish_non_exhaustive()
    }
}
