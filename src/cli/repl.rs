//! Lightweight REPL (Read-Eval-Print-Loop) for nlsql-cli.
//!
//! Provides an interactive mode when no question is provided via `-e` or `-f`.
//! Supports minimal commands:
//! - `/quit`, `/exit`, `/q` - Exit the REPL
//! - `/schema` - List tables and their relationships
//! - `/trace` - Show the previous turn's trace
//! - `/config [show | get <key> | set <key> <value> | reset | reload]` - Inspect or edit settings
//!
//! Any other input is sent as a question to the pipeline. After a
//! clarification request the next line is read as the reply.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use super::bootstrap::CliContext;
use super::config::{run_config, ConfigCommand};
use super::output::print_trace;
use super::runner::execute_once;

/// REPL command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Exit the REPL
    Quit,
    /// Print the schema summary
    Schema,
    /// Print the previous turn's trace
    Trace,
    /// Settings command; holds the text after `/config`
    Config(String),
    /// Unknown command (will show help)
    Unknown(String),
    /// Question (or clarification reply) for the pipeline
    Prompt(String),
    /// Empty input (skip)
    Empty,
}

impl ReplCommand {
    /// Parse user input into a REPL command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        if trimmed.starts_with('/') {
            let lower = trimmed.to_lowercase();
            if let Some(rest) = lower.strip_prefix("/config") {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    // Keep the user's casing for keys and values
                    let args = trimmed.get("/config".len()..).unwrap_or_default();
                    return ReplCommand::Config(args.trim().to_string());
                }
            }
            match lower.as_str() {
                "/quit" | "/exit" | "/q" => ReplCommand::Quit,
                "/schema" => ReplCommand::Schema,
                "/trace" => ReplCommand::Trace,
                _ => ReplCommand::Unknown(trimmed.to_string()),
            }
        } else {
            ReplCommand::Prompt(trimmed.to_string())
        }
    }
}

/// Run an interactive REPL session.
///
/// Returns when the user exits or on EOF (Ctrl+D).
pub async fn run_repl(ctx: &mut CliContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    // Piped input gets no banner or prompts
    let interactive = atty::is(atty::Stream::Stdin);

    if interactive {
        eprintln!("nlsql-cli interactive mode ({})", ctx.database.display());
        eprintln!("Type /schema for tables, /trace for the last turn, /config for settings, /quit to exit\n");
    }

    loop {
        if interactive {
            let marker = if ctx.session.awaiting_clarification() { "? " } else { "> " };
            print!("{}", marker);
            stdout.flush()?;
        }

        // Read line
        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            // EOF (Ctrl+D)
            eprintln!("\nGoodbye!");
            break;
        }

        // Parse and handle command
        match ReplCommand::parse(&input) {
            ReplCommand::Empty => {
                continue;
            }
            ReplCommand::Quit => {
                eprintln!("Goodbye!");
                break;
            }
            ReplCommand::Schema => {
                println!("{}", schema_summary(ctx));
            }
            ReplCommand::Trace => match &ctx.last_trace {
                Some(trace) => print_trace(trace),
                None => eprintln!("No turn processed yet"),
            },
            ReplCommand::Config(args) => {
                let result = match ConfigCommand::parse(&args) {
                    Ok(command) => run_config(&ctx.settings_manager, &command).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(text) => println!("{}", text),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Available: /schema, /trace, /config, /quit, /exit, /q");
                continue;
            }
            ReplCommand::Prompt(prompt) => {
                if let Err(e) = execute_once(ctx, &prompt).await {
                    eprintln!("Error: {}", e);
                }

                println!(); // Blank line between interactions
            }
        }
    }

    Ok(())
}

fn schema_summary(ctx: &CliContext) -> String {
    let schema = ctx.schema();
    let mut lines: Vec<String> = schema
        .tables
        .iter()
        .map(|(name, info)| format!("{} ({} rows): {}", name, info.row_count, info.columns.join(", ")))
        .collect();
    for (table, fk) in schema.foreign_key_edges() {
        lines.push(format!(
            "  {}.{} → {}.{}",
            table, fk.column, fk.target_table, fk.target_column
        ));
    }
    lines.join("\n")
}
