//! CLI bootstrap - Initialize the pipeline, adapters and session for CLI usage.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::executor::SqliteExecutor;
use crate::llm::OpenAiCompatClient;
use crate::pipeline::{Pipeline, SessionState, Trace};
use crate::schema::SchemaView;
use crate::settings::{self, NlsqlSettings, SettingsManager};

use super::args::Args;

/// Context for CLI execution containing all initialized services.
pub struct CliContext {
    pub pipeline: Pipeline,

    /// Conversation state carried across questions
    pub session: SessionState,

    /// Resolved database path
    pub database: PathBuf,

    /// Settings manager
    pub settings_manager: Arc<SettingsManager>,

    /// Trace of the most recent turn, for `/trace`
    pub last_trace: Option<Trace>,

    /// Command-line arguments
    pub args: Args,
}

impl CliContext {
    pub fn schema(&self) -> &SchemaView {
        &self.session.schema
    }
}

/// Initialize the CLI context: settings, logging, adapters and a fresh session.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        // Only warn on errors other than file not found
        if !matches!(e, dotenvy::Error::Io(_)) {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // Load settings
    let settings_manager = Arc::new(
        match &args.config {
            Some(path) => SettingsManager::with_path(path).await,
            None => SettingsManager::new().await,
        }
        .context("Failed to initialize settings manager")?,
    );

    // Ensure settings file exists (creates template on first run)
    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    let mut settings = settings_manager.get().await;
    init_logging(args, &settings);
    apply_overrides(&mut settings, args);

    let database = args.resolve_database()?;

    if args.verbose {
        eprintln!("[cli] Database: {}", database.display());
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
        eprintln!("[cli] Model: {}", settings.llm.model);
        eprintln!("[cli] Max retries: {}", settings.pipeline.max_retries);
    }

    let executor = SqliteExecutor::open(&database, settings.pipeline.max_rows)?;

    let schema = match &args.schema {
        Some(path) => SchemaView::from_json_file(path)
            .with_context(|| format!("Failed to load schema from {}", path.display()))?,
        None => executor.load_schema()?,
    };
    if schema.is_empty() {
        anyhow::bail!("Database '{}' has no tables", database.display());
    }

    if args.verbose {
        eprintln!(
            "[cli] Schema: {} tables, {} columns, {} rows",
            schema.tables.len(),
            schema.total_columns(),
            schema.total_rows()
        );
    }

    let api_key = settings::api_key(&settings, args.api_key.as_deref()).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key found. Set llm.api_key in {}, export one of {}, or use --api-key",
            settings_manager.path().display(),
            settings::API_KEY_ENV_VARS.join(", ")
        )
    })?;

    let generator =
        OpenAiCompatClient::new(&settings.llm.base_url, api_key, settings.llm.model.clone())?
            .with_sampling(settings.llm.temperature, settings.llm.max_tokens);

    let pipeline = Pipeline::new(
        Arc::new(generator),
        Arc::new(executor),
        settings.pipeline_config(),
    );
    let session = SessionState::new(Arc::new(schema), settings.pipeline.memory_turns);

    Ok(CliContext {
        pipeline,
        session,
        database,
        settings_manager,
        last_trace: None,
        args: args.clone(),
    })
}

/// Install the global subscriber: `nlsql=debug` with `--verbose`, else the
/// configured level. `RUST_LOG` directives are kept.
fn init_logging(args: &Args, settings: &NlsqlSettings) {
    let level = if args.verbose {
        "debug"
    } else {
        settings.advanced.log_level.as_str()
    };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    match format!("nlsql_lib={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("[cli] Ignoring invalid log level '{}': {}", level, e),
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command-line flags win over the settings file.
fn apply_overrides(settings: &mut NlsqlSettings, args: &Args) {
    if let Some(model) = &args.model {
        settings.llm.model = model.clone();
    }
    if let Some(max_retries) = args.max_retries {
        settings.pipeline.max_retries = max_retries;
    }
}
