//! `/config` REPL commands backed by the settings manager.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::settings::SettingsManager;

/// Settings operations reachable from the REPL.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Print the whole settings file (API key masked)
    Show,
    Get(String),
    /// Dot-path key and a JSON value (bare words are taken as strings)
    Set(String, Value),
    Reset,
    Reload,
}

impl ConfigCommand {
    /// Parse the text after `/config`.
    pub fn parse(args: &str) -> Result<Self> {
        let mut parts = args.trim().splitn(3, char::is_whitespace);
        let verb = parts.next().unwrap_or_default().to_lowercase();
        let key = parts.next().map(str::trim).filter(|k| !k.is_empty());
        let value = parts.next().map(str::trim).filter(|v| !v.is_empty());

        match (verb.as_str(), key, value) {
            ("" | "show", None, None) => Ok(Self::Show),
            ("get", Some(key), None) => Ok(Self::Get(key.to_string())),
            ("set", Some(key), Some(raw)) => {
                let value =
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                Ok(Self::Set(key.to_string(), value))
            }
            ("reset", None, None) => Ok(Self::Reset),
            ("reload", None, None) => Ok(Self::Reload),
            _ => bail!("Usage: /config [show | get <key> | set <key> <value> | reset | reload]"),
        }
    }
}

/// Run a config command and return the text to print.
pub async fn run_config(manager: &SettingsManager, command: &ConfigCommand) -> Result<String> {
    match command {
        ConfigCommand::Show => {
            let mut settings = manager.get().await;
            if settings.llm.api_key.is_some() {
                settings.llm.api_key = Some("********".to_string());
            }
            Ok(format!(
                "# {}\n{}",
                manager.path().display(),
                toml::to_string_pretty(&settings)?
            ))
        }
        ConfigCommand::Get(key) => {
            let value = manager.get_value(key).await?;
            if key == "llm.api_key" && !value.is_null() {
                return Ok("********".to_string());
            }
            Ok(serde_json::to_string_pretty(&value)?)
        }
        ConfigCommand::Set(key, value) => {
            manager.set_value(key, value.clone()).await?;
            tracing::info!(%key, "Setting updated");
            Ok(format!(
                "Saved {} = {} (applies from the next start)",
                key, value
            ))
        }
        ConfigCommand::Reset => {
            manager.reset().await?;
            Ok(format!("Reset {} to defaults", manager.path().display()))
        }
        ConfigCommand::Reload => {
            manager.reload().await?;
            Ok(format!("Reloaded {}", manager.path().display()))
        }
    }
}
