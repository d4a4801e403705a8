//! Centralized TOML-based settings.
//!
//! Settings are loaded from `~/.nlsql/settings.toml` with environment variable
//! interpolation support. API keys also fall back to the usual provider
//! environment variables through the `get_with_env_fallback` helper.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nlsql_lib::settings::{SettingsManager, api_key};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//! let key = api_key(&settings, None);
//! let config = settings.pipeline_config();
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager};
pub use schema::NlsqlSettings;

/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_ENV_VARS: &[&str] = &["NLSQL_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"];

/// API key from an explicit override, then settings, then the environment.
pub fn api_key(settings: &NlsqlSettings, explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    get_with_env_fallback(&settings.llm.api_key, API_KEY_ENV_VARS, None)
}
