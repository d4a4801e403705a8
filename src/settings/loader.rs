//! Settings loading, saving, and environment variable interpolation.
//!
//! The `SettingsManager` handles:
//! - Loading settings from `~/.nlsql/settings.toml` (or an explicit path)
//! - Resolving `$VAR` and `${VAR}` environment variable references
//! - Atomic file writes with temp file + rename
//! - First-run template generation

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::NlsqlSettings;

/// Embedded template for first-run generation.
const TEMPLATE: &str = include_str!("template.toml");

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nlsql")
        .join("settings.toml")
}

/// Manages settings loading, interpolation, and persistence.
pub struct SettingsManager {
    /// Cached settings (with env vars resolved)
    settings: RwLock<NlsqlSettings>,

    /// Path to the settings file
    path: PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager, loading from disk if available.
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    /// Create a SettingsManager backed by a specific file.
    pub async fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Self::load_from_path(&path).await?;

        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    /// Load settings from a specific path.
    async fn load_from_path(path: &PathBuf) -> Result<NlsqlSettings> {
        if !path.exists() {
            tracing::debug!("Settings file not found at {:?}, using defaults", path);
            return Ok(NlsqlSettings::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read settings file")?;

        // Parse into typed struct
        let mut settings: NlsqlSettings =
            toml::from_str(&contents).context("Failed to deserialize settings")?;

        // Resolve environment variable references
        Self::resolve_env_vars(&mut settings);

        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Resolve $ENV_VAR references in string fields.
    fn resolve_env_vars(settings: &mut NlsqlSettings) {
        // Helper to resolve a single optional string
        fn resolve_opt(value: &mut Option<String>) {
            if let Some(v) = value {
                if let Some(resolved) = resolve_env_ref(v) {
                    *v = resolved;
                }
            }
        }

        resolve_opt(&mut settings.llm.api_key);
        if let Some(resolved) = resolve_env_ref(&settings.llm.base_url) {
            settings.llm.base_url = resolved;
        }
        if let Some(resolved) = resolve_env_ref(&settings.llm.model) {
            settings.llm.model = resolved;
        }
    }

    /// Get the current settings (read-only).
    pub async fn get(&self) -> NlsqlSettings {
        self.settings.read().await.clone()
    }

    /// Update settings and persist to disk.
    pub async fn update(&self, new_settings: NlsqlSettings) -> Result<()> {
        // Update cached settings
        *self.settings.write().await = new_settings.clone();

        // Serialize to TOML
        let toml_string =
            toml::to_string_pretty(&new_settings).context("Failed to serialize settings")?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, &toml_string).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::info!("Saved settings to {:?}", self.path);
        Ok(())
    }

    /// Get a specific setting by dot-notation key (e.g., "pipeline.max_retries").
    pub async fn get_value(&self, key: &str) -> Result<serde_json::Value> {
        let settings = self.settings.read().await;
        let json = serde_json::to_value(&*settings)?;

        // Navigate by key path
        let mut current = &json;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| anyhow::anyhow!("Setting '{}' not found", key))?;
        }

        Ok(current.clone())
    }

    /// Set a specific setting by dot-notation key.
    pub async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut settings = self.settings.write().await;
        let mut json = serde_json::to_value(&*settings)?;

        // Navigate and set by key path
        let parts: Vec<&str> = key.split('.').collect();
        set_nested_value(&mut json, &parts, value)?;

        // Deserialize back
        *settings = serde_json::from_value(json)?;
        drop(settings);

        // Persist
        self.update(self.get().await).await
    }

    /// Reset to defaults and persist.
    pub async fn reset(&self) -> Result<()> {
        self.update(NlsqlSettings::default()).await
    }

    /// Get the settings file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Ensure settings file exists, creating from template if needed.
    ///
    /// Returns `true` if a new file was created.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false); // Already exists
        }

        // Create parent directory
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write template
        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("Generated settings template at {:?}", self.path);
        Ok(true) // Created new file
    }

    /// Reload settings from disk.
    pub async fn reload(&self) -> Result<()> {
        let settings = Self::load_from_path(&self.path).await?;
        *self.settings.write().await = settings;
        Ok(())
    }
}

/// Replace the value at a dot-separated path inside a JSON object tree.
fn set_nested_value(
    json: &mut serde_json::Value,
    parts: &[&str],
    value: serde_json::Value,
) -> Result<()> {
    let Some((leaf, parents)) = parts.split_last() else {
        anyhow::bail!("Empty key path");
    };

    let mut current = json;
    for part in parents {
        current = current
            .get_mut(*part)
            .ok_or_else(|| anyhow::anyhow!("Setting path '{}' not found", parts.join(".")))?;
    }

    let obj = current
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Cannot set '{}' on a non-table value", parts.join(".")))?;
    obj.insert((*leaf).to_string(), value);
    Ok(())
}

/// Value of the environment variable named by `$NAME` or `${NAME}`.
///
/// `None` when the string is not a reference or the variable is unset.
fn resolve_env_ref(value: &str) -> Option<String> {
    let reference = value.trim().strip_prefix('$')?;
    let name = reference
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(reference);
    std::env::var(name).ok()
}

/// First non-empty value among the setting, then `env_vars` in order, then `default`.
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    setting
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_vars
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|v| !v.is_empty())
        })
        .or(default)
}
