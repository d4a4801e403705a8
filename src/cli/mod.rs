//! CLI module for asking questions of a SQLite database.
//!
//! # Architecture
//!
//! The CLI wires the real adapters into a [`Pipeline`](crate::pipeline::Pipeline)
//! and owns one [`SessionState`](crate::pipeline::SessionState) for the whole
//! run, so clarifications and conversational context carry across questions.
//!
//! ```text
//! +-----------------+     +-------------+     +---------------+
//! | runner / repl   | --> | Pipeline    | --> | output.rs     |
//! | (questions)     |     | (process()) |     | (print/JSON)  |
//! +-----------------+     +-------------+     +---------------+
//! ```
//!
//! # REPL Mode
//!
//! When no question is provided via `-e` or `-f`, the CLI enters
//! interactive REPL mode. See `repl.rs` for details.

mod args;
mod bootstrap;
mod config;
mod output;
mod repl;
mod runner;

pub use args::Args;
pub use bootstrap::{initialize, CliContext};
pub use output::print_outcome;
pub use repl::run_repl;
pub use runner::{execute_batch, execute_once};
