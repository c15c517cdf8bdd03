//! # archseek CLI
//!
//! Command-line harness for searching forensic container archives.
//!
//! ## Commands
//!
//! - `archseek run <archive> --patterns <file>` - Search a pattern list and write a run report
//! - `archseek query <archive> <pattern>...` - Search a few patterns and print the hits
//! - `archseek stats <archive>` - Show index and bucket statistics
//!
//! ## Example Usage
//!
//! ```bash
//! # Full run with extraction of every hit
//! archseek run ffs.tar.gz --patterns path_list.txt --extract
//!
//! # One-off lookups
//! archseek query ffs.zip "*/mobile/Library/SMS/sms.db*" "**/*.plist"
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// archseek - Fast glob search inside forensic archives
#[derive(Parser, Debug)]
#[command(name = "archseek")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every pattern of a list and write a run report
    Run {
        /// Archive to search (.tar, .tar.gz, .tgz, .zip)
        archive: PathBuf,

        /// Pattern file, one glob per line
        #[arg(short, long)]
        patterns: PathBuf,

        /// Directory for run outputs (default: data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Extract every hit into the run directory
        #[arg(short = 'x', long)]
        extract: bool,

        /// Compare names and patterns case-sensitively
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Also write the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search patterns and print the matching archive paths
    #[command(alias = "q")]
    Query {
        /// Archive to search
        archive: PathBuf,

        /// One or more glob patterns
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Compare names and patterns case-sensitively
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Print the routing decision for each pattern
        #[arg(long)]
        explain: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show index and bucket statistics of an archive
    Stats {
        /// Archive to inspect
        archive: PathBuf,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => archseek_core::Config::load_from(path)?,
        None => archseek_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let app = app::App::new(config, cli.quiet);

    // Execute command
    match cli.command {
        Commands::Run {
            archive,
            patterns,
            out,
            extract,
            case_sensitive,
            json,
        } => commands::run::run(
            app,
            commands::run::RunArgs {
                archive,
                patterns,
                out,
                extract,
                case_sensitive,
                json,
            },
        ),
        Commands::Query {
            archive,
            patterns,
            case_sensitive,
            explain,
            output,
        } => commands::query::run(app, &archive, &patterns, case_sensitive, explain, output),
        Commands::Stats { archive } => commands::stats::run(app, &archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "archseek",
            "run",
            "ffs.tar.gz",
            "--patterns",
            "path_list.txt",
            "--extract",
            "-s",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                archive,
                patterns,
                out,
                extract,
                case_sensitive,
                json,
            } => {
                assert_eq!(archive, PathBuf::from("ffs.tar.gz"));
                assert_eq!(patterns, PathBuf::from("path_list.txt"));
                assert_eq!(out, None);
                assert!(extract);
                assert!(case_sensitive);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_patterns() {
        assert!(Cli::try_parse_from(["archseek", "run", "ffs.tar"]).is_err());
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from([
            "archseek",
            "--config",
            "custom.toml",
            "query",
            "ffs.zip",
            "*.plist",
            "**/sms.db*",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Query {
                patterns, output, ..
            } => {
                assert_eq!(patterns, vec!["*.plist", "**/sms.db*"]);
                assert_eq!(output, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_query_requires_a_pattern() {
        assert!(Cli::try_parse_from(["archseek", "query", "ffs.zip"]).is_err());
        assert!(Cli::try_parse_from(["archseek", "query", "ffs.zip", "x", "--output", "xml"]).is_err());
    }

    #[test]
    fn test_parse_stats_quiet() {
        let cli = Cli::try_parse_from(["archseek", "stats", "ffs.tar", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Stats { .. }));
    }
}
