use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NlsqlError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Generation error: {0}")]
    Generation(#[from] crate::llm::GenerationError),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::executor::ExecutionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Serialize as the display string so errors can ride along in JSON output
impl Serialize for NlsqlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NlsqlError>;
