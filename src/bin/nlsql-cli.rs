//! nlsql CLI - Ask a SQLite database questions in plain language
//!
//! # Usage
//!
//! ```bash
//! # Ask a single question
//! ./target/debug/nlsql-cli chinook.db -e "How many tracks are there?"
//!
//! # JSON output for scripting
//! ./target/debug/nlsql-cli chinook.db -e "Top 5 artists by sales" --json | jq .
//!
//! # Quiet mode - only the answer
//! ./target/debug/nlsql-cli chinook.db -e "What tables are in this database?" -q
//!
//! # Questions from a file; a line after a clarification answers it
//! ./target/debug/nlsql-cli chinook.db -f questions.txt
//!
//! # Interactive REPL mode (when no -e or -f provided)
//! ./target/debug/nlsql-cli chinook.db
//! ```

use anyhow::Result;
use clap::Parser;

use nlsql_lib::cli::{execute_batch, execute_once, initialize, run_repl, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut ctx = initialize(&args).await?;

    if let Some(ref question) = args.execute {
        execute_once(&mut ctx, question).await
    } else if let Some(ref file) = args.file {
        execute_batch(&mut ctx, file).await
    } else {
        run_repl(&mut ctx).await
    }
}
