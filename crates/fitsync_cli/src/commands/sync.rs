//! The `sync` command: run the directional reconcile loop.

use std::process::ExitCode;

use console::{Term, style};
use fitsync::cache::FileCacheStore;
use fitsync::catalog::settings;
use fitsync::legacy;
use fitsync::sync::{
    CancelFlag, Direction, DirectionEnd, DirectionReport, SyncContext, SyncOptions, sync_direction,
};
use fitsync::{CatalogError, connect_and_migrate};

use crate::config::{AppConfig, CONFIG_FILE, clear_session};
use crate::progress;

/// Directions assumed when none are configured or requested.
const DEFAULT_DIRECTIONS: &[&str] = &["strava_to_garmin", "garmin_to_strava"];

#[derive(Debug, Clone, clap::Args)]
pub struct SyncArgs {
    /// Skip the pre-run confirmation and sync straight through
    #[arg(long)]
    pub auto: bool,

    /// Directions to sync (e.g. strava_to_garmin garmin_to_onedrive)
    #[arg(long, num_args = 1..)]
    pub directions: Vec<String>,

    /// Max activities per direction per run
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Walk the full history instead of the incremental window
    #[arg(long)]
    pub migration_mode: bool,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Sweep expired and dangling cache entries, then exit
    #[arg(long)]
    pub cleanup_cache: bool,

    /// Print sync status, then exit
    #[arg(long)]
    pub status: bool,

    /// Clear a platform's session data (strava, garmin, garmin_cn), then exit
    #[arg(long, value_name = "PLATFORM")]
    pub clear_session: Option<String>,
}

pub async fn handle_sync(args: SyncArgs, config: &AppConfig, cancel: CancelFlag) -> ExitCode {
    if let Some(platform) = &args.clear_session {
        return handle_clear_session(platform);
    }

    let db = match connect_and_migrate(&config.database_url()).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open catalog: {e}");
            return ExitCode::from(1);
        }
    };

    // Fold in the legacy JSON store if one is still sitting around.
    match legacy::import_legacy_store(&db, &config.legacy_store_path()).await {
        Ok(Some(report)) => {
            println!(
                "Imported legacy store: {} activities, {} mappings, {} statuses",
                report.activities, report.mappings, report.statuses
            );
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Legacy store import failed: {e}");
            return ExitCode::from(1);
        }
    }

    let cache = FileCacheStore::new(config.cache_dir());
    if let Err(e) = cache.init().await {
        eprintln!("Failed to prepare cache directory: {e}");
        return ExitCode::from(1);
    }

    // Startup sweep validates cache rows against the disk.
    let ttl = match settings::cache_ttl_days(&db).await {
        Ok(days) => chrono::Duration::days(days),
        Err(e) => {
            eprintln!("Catalog error: {e}");
            return ExitCode::from(1);
        }
    };
    match cache.sweep(&db, ttl).await {
        Ok(report) if args.cleanup_cache => {
            println!(
                "Cache cleanup: {} expired, {} dangling entries removed",
                report.expired, report.dangling
            );
            return ExitCode::SUCCESS;
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Cache sweep failed: {e}");
            return ExitCode::from(1);
        }
    }

    if args.status {
        return super::status::print_status(&db).await;
    }

    let directions = match resolve_directions(&args, &db).await {
        Ok(directions) => directions,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    if directions.is_empty() {
        println!("No enabled directions to sync.");
        return ExitCode::SUCCESS;
    }

    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    let transcoder = config.transcoder();

    let options = SyncOptions {
        batch_size: args.batch_size.unwrap_or(config.sync.batch_size),
        migration_mode: args.migration_mode,
        cancel: cancel.clone(),
        ..SyncOptions::default()
    };

    // Without --auto, a terminal run confirms the plan before any API call
    // is spent. Non-terminal runs (cron, CI) behave as if --auto was given.
    if !args.auto && !confirm_plan(&directions, &options) {
        println!("Aborted.");
        return ExitCode::SUCCESS;
    }

    let ctx = SyncContext {
        db: &db,
        registry: &registry,
        cache: &cache,
        transcoder: transcoder.as_ref(),
    };

    let reporter = progress::Reporter::new();
    let mut reports = Vec::new();

    for direction in directions {
        if cancel.is_cancelled() {
            break;
        }

        let callback = reporter.callback();
        match sync_direction(&ctx, direction, &options, Some(&callback)).await {
            Ok(report) => reports.push(report),
            Err(fitsync::sync::SyncError::Catalog(CatalogError::Corruption(message))) => {
                // Corruption aborts the entire invocation; no partial state.
                eprintln!("{} {message}", style("Catalog corruption:").red().bold());
                return ExitCode::from(1);
            }
            Err(e) => {
                eprintln!("{direction}: {e}");
                reports.push(DirectionReport {
                    end: DirectionEnd::Failed {
                        message: e.to_string(),
                    },
                    ..DirectionReport::new(direction)
                });
            }
        }
    }

    print_summary(&reports);
    ExitCode::from(exit_code_for(&reports))
}

/// Show the planned run and ask for a go-ahead. Always proceeds when no
/// terminal is attached, since there is nobody to ask.
fn confirm_plan(directions: &[Direction], options: &SyncOptions) -> bool {
    let term = Term::stdout();
    if !term.is_term() {
        return true;
    }

    println!("{}", style("Planned sync").bold());
    for direction in directions {
        println!("  {direction}");
    }
    println!(
        "  batch size {}, {} mode",
        options.batch_size,
        if options.migration_mode {
            "migration"
        } else {
            "incremental"
        }
    );

    print!("Proceed? [Y/n] ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
    match term.read_line() {
        Ok(answer) => {
            let answer = answer.trim().to_lowercase();
            answer.is_empty() || answer == "y" || answer == "yes"
        }
        Err(_) => false,
    }
}

fn handle_clear_session(platform: &str) -> ExitCode {
    let platform = match platform.parse() {
        Ok(platform) => platform,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    match clear_session(std::path::Path::new(CONFIG_FILE), platform) {
        Ok(true) => {
            println!("Session data cleared for {platform}. The next sync will require reauth.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("No session data stored for {platform}.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

/// Requested directions, or the enabled subset of the defaults.
async fn resolve_directions(
    args: &SyncArgs,
    db: &sea_orm::DatabaseConnection,
) -> Result<Vec<Direction>, String> {
    let tokens: Vec<String> = if args.directions.is_empty() {
        DEFAULT_DIRECTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        args.directions.clone()
    };

    let mut directions = Vec::new();
    for token in &tokens {
        let direction: Direction = token.parse()?;
        let enabled = settings::direction_enabled(db, &direction)
            .await
            .map_err(|e| e.to_string())?;
        if enabled {
            directions.push(direction);
        } else if !args.directions.is_empty() {
            // Explicitly requested but disabled: tell the operator.
            println!("{direction} is disabled by its sync rule, skipping");
        }
    }

    Ok(directions)
}

fn print_summary(reports: &[DirectionReport]) {
    println!("\n{}", style("Sync summary").bold());

    for report in reports {
        let end = match &report.end {
            DirectionEnd::Completed => style("completed").green().to_string(),
            DirectionEnd::RateLimited { retry_after } => style(format!(
                "rate limited, retry in {} min",
                retry_after.num_minutes().max(1)
            ))
            .yellow()
            .to_string(),
            DirectionEnd::Unauthorized => style("authentication required").red().to_string(),
            DirectionEnd::Cancelled => style("cancelled").yellow().to_string(),
            DirectionEnd::Failed { message } => style(format!("failed: {message}")).red().to_string(),
        };

        println!(
            "  {}: {} synced, {} duplicate, {} skipped, {} failed, {} pending ({end})",
            report.direction,
            report.counts.synced,
            report.counts.duplicate,
            report.counts.skipped,
            report.counts.failed,
            report.counts.pending,
        );
        for error in &report.errors {
            println!("    {}", style(error).dim());
        }
    }
}

fn exit_code_for(reports: &[DirectionReport]) -> u8 {
    let any_failure = reports.iter().any(|r| {
        matches!(
            r.end,
            DirectionEnd::Unauthorized | DirectionEnd::Failed { .. }
        )
    });
    if any_failure {
        return 1;
    }

    let any_rate_limited = reports
        .iter()
        .any(|r| matches!(r.end, DirectionEnd::RateLimited { .. }));
    if any_rate_limited {
        return 3;
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitsync::Platform;

    fn report(end: DirectionEnd) -> DirectionReport {
        DirectionReport {
            end,
            ..DirectionReport::new(Direction::new(Platform::Strava, Platform::Garmin))
        }
    }

    #[test]
    fn exit_codes_follow_the_contract() {
        assert_eq!(exit_code_for(&[report(DirectionEnd::Completed)]), 0);
        assert_eq!(
            exit_code_for(&[report(DirectionEnd::RateLimited {
                retry_after: chrono::Duration::minutes(5)
            })]),
            3
        );
        assert_eq!(exit_code_for(&[report(DirectionEnd::Unauthorized)]), 1);
        // Operational failure wins over rate limiting.
        assert_eq!(
            exit_code_for(&[
                report(DirectionEnd::RateLimited {
                    retry_after: chrono::Duration::minutes(5)
                }),
                report(DirectionEnd::Unauthorized),
            ]),
            1
        );
    }
}
