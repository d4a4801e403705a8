//! CLI output handling - renders one turn's outcome.
//!
//! Output mode is terminal (trace, query, rows and answer), JSON (one line
//! per turn) or quiet (answer only).

use std::io::{self, Write};

use anyhow::Result;

use crate::executor::QueryRows;
use crate::pipeline::{Trace, TurnOutcome};

/// Rows shown in terminal mode before eliding the rest.
const PREVIEW_ROWS: usize = 20;

/// Print a turn outcome in the selected mode.
///
/// # Arguments
///
/// * `outcome` - What the pipeline produced for the turn
/// * `json_mode` - If true, output the outcome as a single JSON line
/// * `quiet_mode` - If true, only output the main message
pub fn print_outcome(outcome: &TurnOutcome, json_mode: bool, quiet_mode: bool) -> Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string(outcome)?);
        io::stdout().flush()?;
        return Ok(());
    }

    if quiet_mode {
        match outcome {
            TurnOutcome::Failure { reason, .. } => eprintln!("Error: {}", reason),
            other => println!("{}", other.message()),
        }
        return Ok(());
    }

    print_trace(outcome.trace());

    match outcome {
        TurnOutcome::Clarification {
            question, options, ..
        } => {
            println!("{}", question);
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
        }
        TurnOutcome::Chat { reply, .. } => println!("{}", reply),
        TurnOutcome::MetaAnswer { summary, table, .. } => {
            println!("{}", summary);
            if !table.rows.is_empty() {
                let rows = QueryRows::new(table.columns.clone(), table.rows.clone());
                println!("\n{}", rows.preview(PREVIEW_ROWS));
            }
        }
        TurnOutcome::QueryResult {
            answer,
            query,
            reasoning,
            rows,
            attempts,
            ..
        } => {
            if let Some(reasoning) = reasoning {
                eprintln!("[reasoning] {}", truncate(reasoning, 200));
            }
            if attempts.len() > 1 {
                eprintln!("[attempts] succeeded on attempt {}", attempts.len());
            }
            println!("SQL: {}\n", query);
            println!("{}", rows.preview(PREVIEW_ROWS));
            println!("\n{}", answer);
        }
        TurnOutcome::Failure {
            reason, attempts, ..
        } => {
            for attempt in attempts {
                if let Some(error) = attempt.error() {
                    eprintln!(
                        "[attempt {}] {:?} {} -> {}",
                        attempt.index + 1,
                        attempt.stage,
                        truncate(&attempt.query, 80),
                        truncate(error, 100)
                    );
                }
            }
            eprintln!("Error: {}", reason);
        }
    }
    io::stdout().flush()?;
    Ok(())
}

/// Print a trace to stderr, one entry per line.
pub fn print_trace(trace: &Trace) {
    for line in trace.render().lines() {
        eprintln!("  {}", line);
    }
}

/// Truncate a string to a maximum number of characters.
pub(super) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
