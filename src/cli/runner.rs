//! CLI execution runner.
//!
//! Sends questions through the pipeline and prints each outcome.

use std::path::Path;

use anyhow::{Context, Result};

use super::bootstrap::CliContext;
use super::output::{print_outcome, truncate};

/// Process a single question and print the outcome.
///
/// A clarification request leaves the session waiting; the next question
/// sent through the same context is read as the reply.
pub async fn execute_once(ctx: &mut CliContext, question: &str) -> Result<()> {
    let outcome = ctx.pipeline.process(question, &mut ctx.session).await;
    print_outcome(&outcome, ctx.args.json, ctx.args.quiet)?;
    ctx.last_trace = Some(outcome.trace().clone());
    Ok(())
}

/// Process questions from a file, one per line.
///
/// Each non-empty, non-comment line is processed sequentially.
/// Lines starting with `#` are treated as comments. A line following a
/// clarification request answers it.
pub async fn execute_batch(ctx: &mut CliContext, file_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read question file: {}", file_path.display()))?;

    let questions = parse_batch(&content);
    if questions.is_empty() {
        anyhow::bail!("No questions found in file: {}", file_path.display());
    }

    let total = questions.len();
    if !ctx.args.quiet {
        eprintln!(
            "[batch] Processing {} question(s) from {}",
            total,
            file_path.display()
        );
    }

    for (i, question) in questions.iter().enumerate() {
        if !ctx.args.quiet {
            let label = if ctx.session.awaiting_clarification() {
                "Replying"
            } else {
                "Asking"
            };
            eprintln!(
                "\n[batch] [{}/{}] {}: {}",
                i + 1,
                total,
                label,
                truncate(question, 50)
            );
        }

        execute_once(ctx, question).await?;
    }

    if ctx.session.awaiting_clarification() {
        tracing::warn!("Batch ended while a clarification was pending");
    }
    if !ctx.args.quiet {
        eprintln!("\n[batch] All {} question(s) processed", total);
    }

    Ok(())
}

fn parse_batch(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
