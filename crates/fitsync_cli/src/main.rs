//! FitSync CLI - command-line interface for the sync engine.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::Term;
use fitsync::sync::CancelFlag;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Log file next to the catalog, per the persisted state layout.
const LOG_FILE: &str = "sync_logs.log";

#[derive(Parser)]
#[command(name = "fitsync")]
#[command(version)]
#[command(about = "Multi-platform athletic-activity synchronization")]
#[command(
    long_about = "FitSync reconciles the activity catalogs of heterogeneous fitness platforms \
(Strava, Garmin Connect, iGPSPORT, OneDrive, Intervals.icu) so a workout recorded on any \
participating platform appears on every configured destination exactly once."
)]
#[command(after_long_help = r#"EXAMPLES
    Incremental sync of the default directions:
        $ fitsync sync --auto

    Sync specific directions with a bigger batch:
        $ fitsync sync --directions strava_to_garmin strava_to_onedrive --batch-size 25

    Walk the full history (lifts the 30-day first-sync cap):
        $ fitsync sync --migration-mode

    Convert a file:
        $ fitsync convert ride.fit gpx -o ride.gpx

CONFIGURATION
    FitSync reads .app_config.json from the current directory. Environment
    variables with the FITSYNC_ prefix override file values
    (e.g. FITSYNC_STRAVA__CLIENT_ID).

EXIT CODES
    0  success
    1  operational failure (unreachable platform, auth failure)
    2  usage error
    3  rate-limited stop, partial progress committed
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the directional sync
    Sync(commands::sync::SyncArgs),
    /// Convert an activity file between FIT/TCX/GPX
    Convert(commands::convert::ConvertArgs),
    /// Show catalog statistics and API budget headroom
    Status,
    /// Database schema migrations and legacy JSON import
    Migrate {
        #[command(subcommand)]
        action: commands::migrate::MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn init_tracing(debug: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if debug {
        "fitsync=debug,fitsync_cli=debug"
    } else {
        "fitsync=info,fitsync_cli=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);

    // A console layer only when nobody is watching the progress bars.
    if Term::stdout().is_term() && !debug {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    }

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Commands that need no logging, config, or database.
    if let Commands::Completions { shell } = &cli.command {
        commands::print_completions(*shell);
        return ExitCode::SUCCESS;
    }

    let debug = matches!(&cli.command, Commands::Sync(args) if args.debug);
    let _log_guard = init_tracing(debug);

    let cancel = CancelFlag::new();
    shutdown::setup_shutdown_handler(cancel.clone());

    let config = match config::AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync(args, &config, cancel).await,
        Commands::Convert(args) => commands::convert::handle_convert(args, &config).await,
        Commands::Status => commands::status::handle_status(&config).await,
        Commands::Migrate { action } => commands::migrate::handle_migrate(action, &config).await,
        Commands::Completions { .. } => ExitCode::SUCCESS,
    }
}

/// Used by completions generation.
pub(crate) fn command_factory() -> clap::Command {
    use clap::CommandFactory;
    Cli::command()
}
