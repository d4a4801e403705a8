//! Scripted collaborators and a sample schema shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use nlsql_lib::executor::{ExecutionError, QueryExecutor, QueryRows};
use nlsql_lib::llm::{GeneratedQuery, GenerationError, GenerationRequest, TextGenerator};
use nlsql_lib::schema::SchemaView;
use nlsql_lib::{Pipeline, PipelineConfig, SessionState};

/// Music-store schema: Artist ← Album ← Track → Genre, Customer ← Invoice.
pub fn music_store() -> SchemaView {
    serde_json::from_value(json!({
        "tables": {
            "Artist": {
                "columns": ["ArtistId", "Name"],
                "primary_key": ["ArtistId"],
                "row_count": 275
            },
            "Album": {
                "columns": ["AlbumId", "Title", "ArtistId"],
                "primary_key": ["AlbumId"],
                "foreign_keys": [
                    { "column": "ArtistId", "target_table": "Artist", "target_column": "ArtistId" }
                ],
                "row_count": 347
            },
            "Genre": {
                "columns": ["GenreId", "Name"],
                "primary_key": ["GenreId"],
                "row_count": 25
            },
            "Track": {
                "columns": ["TrackId", "Name", "AlbumId", "GenreId", "Composer", "UnitPrice"],
                "primary_key": ["TrackId"],
                "foreign_keys": [
                    { "column": "AlbumId", "target_table": "Album", "target_column": "AlbumId" },
                    { "column": "GenreId", "target_table": "Genre", "target_column": "GenreId" }
                ],
                "row_count": 3503
            },
            "Customer": {
                "columns": ["CustomerId", "FirstName", "LastName", "Country"],
                "primary_key": ["CustomerId"],
                "row_count": 59
            },
            "Invoice": {
                "columns": ["InvoiceId", "CustomerId", "InvoiceDate", "Total"],
                "primary_key": ["InvoiceId"],
                "foreign_keys": [
                    { "column": "CustomerId", "target_table": "Customer", "target_column": "CustomerId" }
                ],
                "row_count": 412
            }
        }
    }))
    .expect("sample schema parses")
}

/// Replays scripted completions in order and records every request.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<GeneratedQuery, GenerationError>>>,
    summary: Result<String, GenerationError>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub summaries: Mutex<usize>,
}

impl ScriptedGenerator {
    pub fn new(queries: &[&str]) -> Self {
        Self::with_results(queries.iter().map(|q| Ok(GeneratedQuery::new(*q))).collect())
    }

    pub fn with_results(results: Vec<Result<GeneratedQuery, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            summary: Ok("Here is what I found.".to_string()),
            requests: Mutex::new(Vec::new()),
            summaries: Mutex::new(0),
        }
    }

    /// Always answer with the same query.
    pub fn repeating(query: &str, times: usize) -> Self {
        Self::new(&vec![query; times])
    }

    pub fn with_summary(mut self, summary: Result<String, GenerationError>) -> Self {
        self.summary = summary;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn summary_count(&self) -> usize {
        *self.summaries.lock()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuery, GenerationError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Malformed("script exhausted".into())))
    }

    async fn summarize(&self, _: &str, _: &str, _: &QueryRows) -> Result<String, GenerationError> {
        *self.summaries.lock() += 1;
        self.summary.clone()
    }

    fn description(&self) -> String {
        "scripted".into()
    }
}

/// Fails queries containing a configured fragment with the paired error and
/// answers everything else with fixed rows.
pub struct RuleExecutor {
    failures: Vec<(&'static str, &'static str)>,
    rows: QueryRows,
    delay: Option<Duration>,
    pub executed: Mutex<Vec<String>>,
}

impl RuleExecutor {
    pub fn new(failures: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            failures,
            rows: QueryRows::new(vec!["COUNT(*)".into()], vec![vec![json!(3503)]]),
            delay: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let mut executor = Self::new(vec![]);
        executor.rows = QueryRows::new(columns.iter().map(|c| c.to_string()).collect(), rows);
        executor
    }

    pub fn slow(delay: Duration) -> Self {
        let mut executor = Self::new(vec![]);
        executor.delay = Some(delay);
        executor
    }

    pub fn executed_count(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait]
impl QueryExecutor for RuleExecutor {
    async fn execute(&self, query: &str) -> Result<QueryRows, ExecutionError> {
        self.executed.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for (fragment, error) in &self.failures {
            if query.contains(fragment) {
                return Err(ExecutionError::Query(error.to_string()));
            }
        }
        Ok(self.rows.clone())
    }

    fn description(&self) -> String {
        "rules".into()
    }
}

pub fn pipeline(
    generator: &Arc<ScriptedGenerator>,
    executor: &Arc<RuleExecutor>,
    config: PipelineConfig,
) -> Pipeline {
    Pipeline::new(
        Arc::clone(generator) as Arc<dyn TextGenerator>,
        Arc::clone(executor) as Arc<dyn QueryExecutor>,
        config,
    )
}

pub fn session() -> SessionState {
    SessionState::new(Arc::new(music_store()), 10)
}
