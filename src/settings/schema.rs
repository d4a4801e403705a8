//! Settings schema definitions for nlsql configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::correction::RetryPolicy;
use crate::intent::PlannerConfig;
use crate::llm::client::DEFAULT_BASE_URL;
use crate::pipeline::PipelineConfig;
use crate::schema::refiner::RefineConfig;

/// Root settings structure.
///
/// Loaded from `~/.nlsql/settings.toml` with environment variable interpolation support.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NlsqlSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Query generation backend
    pub llm: LlmSettings,

    /// Retry budget, timeouts and history
    pub pipeline: PipelineSettings,

    /// Schema projection
    pub schema: SchemaSettings,

    /// Advanced/debug settings
    pub advanced: AdvancedSettings,
}

/// OpenAI-compatible chat completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider label, informational: "groq" | "openai" | "ollama" | ...
    pub provider: String,

    /// Base URL of the chat completions API
    pub base_url: String,

    pub model: String,

    /// API key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub temperature: f32,

    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Attempts after the first one
    pub max_retries: u32,

    /// Row limit for ranking questions without an explicit count
    pub default_limit: u32,

    pub generation_timeout_secs: u64,

    pub execution_timeout_secs: u64,

    /// Rows kept from one execution before truncating
    pub max_rows: usize,

    /// Exchanges of history handed to the generator
    pub context_turns: usize,

    /// Exchanges kept in session memory
    pub memory_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Project the schema down to the tables a question needs
    pub refine: bool,

    /// Seed tables kept after keyword scoring
    pub top_k: usize,

    /// Foreign-key hops followed from the seeds
    pub fk_hops: usize,
}

/// Advanced/debug settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Log level: "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
}

impl NlsqlSettings {
    /// Pipeline tunables derived from the `[pipeline]` and `[schema]` sections.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            retry: RetryPolicy {
                max_retries: self.pipeline.max_retries,
                generation_timeout_ms: self.pipeline.generation_timeout_secs * 1000,
                execution_timeout_ms: self.pipeline.execution_timeout_secs * 1000,
            },
            planner: PlannerConfig {
                default_limit: self.pipeline.default_limit,
            },
            refine: RefineConfig {
                refine: self.schema.refine,
                top_k: self.schema.top_k,
                fk_hops: self.schema.fk_hops,
            },
            context_turns: self.pipeline.context_turns,
        }
    }
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for NlsqlSettings {
    fn default() -> Self {
        Self {
            version: 1,
            llm: LlmSettings::default(),
            pipeline: PipelineSettings::default(),
            schema: SchemaSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            default_limit: 10,
            generation_timeout_secs: 30,
            execution_timeout_secs: 15,
            max_rows: 1000,
            context_turns: 3,
            memory_turns: 10,
        }
    }
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            refine: true,
            top_k: 3,
            fk_hops: 1,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}
