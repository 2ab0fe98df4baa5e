//! JobForecast - terminal dashboard for the employment forecast API
//!
//! Fetches dataset summaries and Monte Carlo predictions from the
//! forecast backend, reshapes them client-side and renders them as
//! stat cards, tables and text charts (or JSON lines).
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error, or the requested operation failed

mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod render;
mod summary;
mod workflow;

use anyhow::{Context, Result};
use api::ApiClient;
use cli::{parse_session_line, Args, Commands, PredictionOptions, SessionCommand, SESSION_HELP};
use config::{Config, PredictionConfig, CONFIG_FILE_NAME};
use models::{HistoryFilter, PredictionRequestParams};
use render::TerminalRenderer;
use std::io::{Stdout, Write};
use std::path::PathBuf;
use summary::{log_system_status, SummaryLoader};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use workflow::{Command, Orchestrator, Outcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if args.command == Commands::InitConfig {
        return handle_init_config();
    }

    // Config comes before logging: it can turn on verbose output
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("JobForecast v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .jobforecast.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to point at your forecast API and tune prediction defaults.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected subcommand. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let api = ApiClient::new(&config.api).context("Failed to set up the API client")?;

    let mut renderer = TerminalRenderer::new(
        std::io::stdout(),
        args.format,
        config.general.export_dir.clone(),
        config.notifications.ttl_seconds,
    );
    if args.quiet {
        renderer = renderer.without_spinner();
    }

    let mut loader = SummaryLoader::new();
    let mut orchestrator = Orchestrator::new(config.prediction.clone());

    let ok = match args.command {
        Commands::Summary => {
            let (_, loaded) = futures::join!(
                log_system_status(&api),
                loader.load_summary(&api, &mut renderer)
            );
            loaded.is_ok()
        }
        Commands::History { job_type, year } => loader
            .load_historical(&api, HistoryFilter { job_type, year }, &mut renderer)
            .await
            .is_ok(),
        Commands::Predict {
            job_type,
            options,
            export,
        } => {
            let mut params = prediction_params(&options, &config.prediction);
            params.job_type = Some(job_type);
            run_prediction(Command::PredictSingle(params), export, &api, &mut orchestrator, &mut renderer)
                .await
        }
        Commands::Batch {
            options,
            jobs,
            export,
        } => {
            let mut params = prediction_params(&options, &config.prediction);
            params.job_types = jobs;
            run_prediction(Command::PredictBatch(params), export, &api, &mut orchestrator, &mut renderer)
                .await
        }
        Commands::Status => {
            log_system_status(&api).await;
            true
        }
        Commands::Interactive => {
            run_interactive(&api, &config, &mut loader, &mut orchestrator, &mut renderer).await?;
            true
        }
        Commands::InitConfig => unreachable!("handled before logging is initialized"),
    };

    for path in renderer.saved_files() {
        debug!("Saved {}", path.display());
    }
    debug!(
        "Finished in {:?} (last outcome {:?}, {:?} view, {} predictions held, summary loaded: {}, history loaded: {})",
        orchestrator.phase(),
        orchestrator.last_outcome(),
        orchestrator.state().display_mode,
        orchestrator.state().current_predictions.len(),
        loader.summary().is_some(),
        loader.history().is_some()
    );

    Ok(if ok { 0 } else { 1 })
}

/// Build fresh request parameters from CLI options and config defaults.
fn prediction_params(options: &PredictionOptions, defaults: &PredictionConfig) -> PredictionRequestParams {
    PredictionRequestParams::batch(
        options.target_year.unwrap_or(defaults.target_year),
        options.simulations.unwrap_or(defaults.n_simulations),
        options.confidence.unwrap_or(defaults.confidence_level),
    )
}

/// Run a prediction and, when asked and it succeeded, export it.
async fn run_prediction(
    command: Command,
    export: bool,
    api: &ApiClient,
    orchestrator: &mut Orchestrator,
    renderer: &mut TerminalRenderer<Stdout>,
) -> bool {
    let outcome = orchestrator.dispatch(command, api, renderer).await;
    if !outcome.is_success() {
        log_failure(&outcome);
        return false;
    }

    if export {
        let outcome = orchestrator.dispatch(Command::Export, api, renderer).await;
        log_failure(&outcome);
        return outcome.is_success();
    }

    true
}

fn log_failure(outcome: &Outcome) {
    if let Outcome::Failed(e) = outcome {
        debug!("Command failed ({:?}): {}", e.kind(), e);
    }
}

/// Interactive session: one command per stdin line until EOF or `quit`.
async fn run_interactive(
    api: &ApiClient,
    config: &Config,
    loader: &mut SummaryLoader,
    orchestrator: &mut Orchestrator,
    renderer: &mut TerminalRenderer<Stdout>,
) -> Result<()> {
    // Startup load; the status check only logs
    let _ = futures::join!(log_system_status(api), loader.load_summary(api, renderer));

    println!("\nType 'help' for a list of commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        let command = match parse_session_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match command {
            SessionCommand::Summary => {
                let _ = loader.load_summary(api, renderer).await;
            }
            SessionCommand::History { job_type, year } => {
                let _ = loader
                    .load_historical(api, HistoryFilter { job_type, year }, renderer)
                    .await;
            }
            SessionCommand::Jobs => {
                let _ = loader.load_job_types(api, renderer).await;
            }
            SessionCommand::Predict {
                target_year,
                job_type,
            } => {
                let defaults = &config.prediction;
                let params = PredictionRequestParams::single(
                    job_type,
                    target_year,
                    defaults.n_simulations,
                    defaults.confidence_level,
                );
                orchestrator
                    .dispatch(Command::PredictSingle(params), api, renderer)
                    .await;
            }
            SessionCommand::Batch { target_year } => {
                let defaults = &config.prediction;
                let params = PredictionRequestParams::batch(
                    target_year.unwrap_or(defaults.target_year),
                    defaults.n_simulations,
                    defaults.confidence_level,
                );
                orchestrator
                    .dispatch(Command::PredictBatch(params), api, renderer)
                    .await;
            }
            SessionCommand::Export => {
                orchestrator.dispatch(Command::Export, api, renderer).await;
            }
            SessionCommand::Reset => {
                orchestrator.dispatch(Command::Reset, api, renderer).await;
            }
            SessionCommand::Notifications => renderer.print_notifications(),
            SessionCommand::Dismiss(id) => {
                if !renderer.dismiss_notification(id) {
                    println!("No active notification with id {}", id);
                }
            }
            SessionCommand::Help => println!("{}", SESSION_HELP),
            SessionCommand::Quit => break,
        }
    }

    info!("Session ended");
    Ok(())
}

/// Where the configuration came from. Logged once logging is set up.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    /// The default file exists but could not be loaded.
    Fallback(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    Ok(match Config::load_default() {
        Ok(Some(config)) => (config, ConfigOrigin::DefaultFile),
        Ok(None) => (Config::default(), ConfigOrigin::Builtin),
        Err(e) => (Config::default(), ConfigOrigin::Fallback(e)),
    })
}
