//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for nlsql-cli.

use clap::Parser;
use std::path::PathBuf;

/// nlsql CLI - Ask questions of a SQLite database in plain language
#[derive(Parser, Debug, Clone)]
#[command(name = "nlsql-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// SQLite database to query (opened read-only)
    pub database: PathBuf,

    /// Pre-computed schema JSON (default: read from the database)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Ask a single question and exit
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Ask questions from a file (one per line) and exit
    #[arg(short = 'f', long, conflicts_with = "execute")]
    pub file: Option<PathBuf>,

    /// Alternate settings file (default: ~/.nlsql/settings.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override model from settings
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API key (overrides settings and env vars)
    #[arg(long, env = "NLSQL_API_KEY")]
    pub api_key: Option<String>,

    /// Override retry budget from settings
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Output each turn as a JSON line (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only output the final answer
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Resolve the database path to an absolute path.
    ///
    /// Returns an error if the path does not exist or is not a file.
    pub fn resolve_database(&self) -> anyhow::Result<PathBuf> {
        let canonical = self.database.canonicalize().map_err(|e| {
            anyhow::anyhow!(
                "Database '{}' does not exist or is not accessible: {}",
                self.database.display(),
                e
            )
        })?;

        if !canonical.is_file() {
            anyhow::bail!("Database '{}' is not a file", canonical.display());
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["nlsql-cli", "chinook.db"]);
        assert_eq!(args.database, PathBuf::from("chinook.db"));
        assert!(args.schema.is_none());
        assert!(args.max_retries.is_none());
        assert!(!args.json);
        assert!(!args.quiet);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_execute_flag() {
        let args = Args::parse_from(["nlsql-cli", "db.sqlite", "-e", "How many tracks?"]);
        assert_eq!(args.execute, Some("How many tracks?".to_string()));
    }

    #[test]
    fn test_args_execute_conflicts_with_file() {
        let result = Args::try_parse_from(["nlsql-cli", "db.sqlite", "-e", "q", "-f", "qs.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "nlsql-cli",
            "db.sqlite",
            "-m",
            "llama-3.1-8b-instant",
            "--max-retries",
            "4",
            "--schema",
            "schema.json",
        ]);
        assert_eq!(args.model.as_deref(), Some("llama-3.1-8b-instant"));
        assert_eq!(args.max_retries, Some(4));
        assert_eq!(args.schema, Some(PathBuf::from("schema.json")));
    }

    #[test]
    fn test_args_output_modes() {
        let args = Args::parse_from(["nlsql-cli", "db.sqlite", "--json", "--quiet"]);
        assert!(args.json);
        assert!(args.quiet);
    }

    #[test]
    fn test_resolve_database_missing() {
        let args = Args::parse_from(["nlsql-cli", "/nonexistent/nowhere.db"]);
        assert!(args.resolve_database().is_err());
    }
}
