//! Natural-language questions to validated, read-only SQL.
//!
//! A turn flows through [`pipeline::Pipeline::process`]: meta-query and
//! ambiguity detection, clarification merging, schema projection, planning,
//! then generation under the [`correction`] state machine with every query
//! passing the [`validation`] gate before it reaches an executor.

pub mod correction;
pub mod error;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{NlsqlError, Result};
pub use pipeline::{Pipeline, PipelineConfig, SessionState, TurnOutcome};
