//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap, including
//! validation, and the line parser of the interactive session.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// JobForecast - terminal dashboard for the employment forecast API
///
/// Browse the dataset summary and historical trends, run Monte Carlo
/// predictions for one job type or the whole catalogue, and export the
/// results as a spreadsheet.
///
/// Examples:
///   jobforecast summary
///   jobforecast history --job-type Petani
///   jobforecast predict --job-type Petani --target-year 2030
///   jobforecast batch --target-year 2035 --export
///   jobforecast --format json interactive
///   jobforecast init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the forecast API
    ///
    /// Overrides the value in .jobforecast.toml.
    #[arg(long, global = true, value_name = "URL", env = "JOBFORECAST_API_URL")]
    pub api_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .jobforecast.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no spinner)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for exported spreadsheets
    #[arg(long, global = true, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Show dataset summary cards
    Summary,

    /// Show the historical trend, optionally filtered
    History {
        /// Only this job type
        #[arg(short, long)]
        job_type: Option<String>,

        /// Only this year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Predict the population of one job type
    Predict {
        /// Job type to predict
        #[arg(short, long)]
        job_type: String,

        #[command(flatten)]
        options: PredictionOptions,

        /// Export the result after a successful prediction
        #[arg(long)]
        export: bool,
    },

    /// Predict every catalogued job type at once
    Batch {
        #[command(flatten)]
        options: PredictionOptions,

        /// Restrict the batch to these job types (comma-separated)
        #[arg(long, value_delimiter = ',')]
        jobs: Option<Vec<String>>,

        /// Export the results after a successful prediction
        #[arg(long)]
        export: bool,
    },

    /// Log the backend status (diagnostics)
    Status,

    /// Read commands from stdin, one per line
    Interactive,

    /// Generate a default .jobforecast.toml configuration file
    InitConfig,
}

/// Simulation settings shared by `predict` and `batch`.
///
/// Missing values fall back to the `[prediction]` config section.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct PredictionOptions {
    /// Year to predict
    #[arg(short, long, value_name = "YEAR")]
    pub target_year: Option<i32>,

    /// Number of Monte Carlo simulations
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub simulations: Option<u32>,

    /// Confidence level of the interval, between 0 and 1
    #[arg(long, value_name = "LEVEL")]
    pub confidence: Option<f64>,
}

/// Output format of the terminal renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown cards and tables (default)
    #[default]
    Markdown,
    /// One JSON object per render instruction
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.command == Commands::InitConfig {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over `verbose = true` in the config file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// A command typed into the interactive session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Summary,
    History { job_type: Option<String>, year: Option<i32> },
    Jobs,
    Predict { target_year: i32, job_type: String },
    Batch { target_year: Option<i32> },
    Export,
    Reset,
    Notifications,
    Dismiss(u64),
    Help,
    Quit,
}

/// Help text of the interactive session.
pub const SESSION_HELP: &str = "\
Commands:
  summary                     reload the dataset summary
  history [YEAR] [JOB TYPE]   historical trend, optionally filtered
  jobs                        list the job catalogue
  predict YEAR JOB TYPE       predict one job type
  batch [YEAR]                predict every job type
  export                      export the current predictions
  reset                       clear the results
  notifications               list active notifications
  dismiss ID                  dismiss a notification
  help                        show this help
  quit                        leave the session";

/// Parse one line of the interactive session.
///
/// Job types may contain spaces, so they always come last on the line.
/// Returns `Ok(None)` for blank lines.
pub fn parse_session_line(line: &str) -> Result<Option<SessionCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match keyword.to_lowercase().as_str() {
        "summary" => SessionCommand::Summary,
        "history" => {
            let (year, job_words) = match rest.first().and_then(|w| w.parse::<i32>().ok()) {
                Some(year) => (Some(year), &rest[1..]),
                None => (None, &rest[..]),
            };
            SessionCommand::History {
                job_type: join_words(job_words),
                year,
            }
        }
        "jobs" => SessionCommand::Jobs,
        "predict" => {
            let year = rest
                .first()
                .ok_or("Usage: predict YEAR JOB TYPE")?
                .parse::<i32>()
                .map_err(|_| "Target year must be a number".to_string())?;
            // An empty job type is left for the workflow's own validation
            SessionCommand::Predict {
                target_year: year,
                job_type: join_words(&rest[1..]).unwrap_or_default(),
            }
        }
        "batch" => {
            let target_year = match rest.first() {
                Some(word) => Some(
                    word.parse::<i32>()
                        .map_err(|_| "Target year must be a number".to_string())?,
                ),
                None => None,
            };
            SessionCommand::Batch { target_year }
        }
        "export" => SessionCommand::Export,
        "reset" => SessionCommand::Reset,
        "notifications" => SessionCommand::Notifications,
        "dismiss" => {
            let id = rest
                .first()
                .ok_or("Usage: dismiss ID")?
                .parse::<u64>()
                .map_err(|_| "Notification id must be a number".to_string())?;
            SessionCommand::Dismiss(id)
        }
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'help' for a list.", other)),
    };

    Ok(Some(command))
}

fn join_words(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
