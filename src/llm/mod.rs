//! Text-generation collaborator interface and its HTTP adapter.

pub mod client;
pub mod prompt;
pub mod response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correction::RetryDirective;
use crate::executor::QueryRows;
use crate::intent::QueryPlan;
use crate::schema::SchemaView;

pub use client::OpenAiCompatClient;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The service could not be reached or refused the request. Terminal
    /// for the turn.
    #[error("Text generation unavailable: {0}")]
    Unavailable(String),

    /// A completion arrived but held no usable query text.
    #[error("Malformed completion: {0}")]
    Malformed(String),
}

/// Everything the generator needs for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Resolved question for this turn
    pub question: String,
    /// Recent conversation, oldest first
    pub context: Option<String>,
    pub plan: QueryPlan,
    /// Schema projection relevant to the question
    pub schema: SchemaView,
    /// Present on regeneration attempts
    pub directive: Option<RetryDirective>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    pub reasoning: Option<String>,
}

impl GeneratedQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reasoning: None,
        }
    }
}

/// Opaque query-generation and answer-writing service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuery, GenerationError>;

    /// Turn executed rows into a natural-language answer.
    async fn summarize(
        &self,
        question: &str,
        query: &str,
        rows: &QueryRows,
    ) -> Result<String, GenerationError>;

    fn description(&self) -> String;
}
