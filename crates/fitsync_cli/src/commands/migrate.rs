//! The `migrate` command: schema migrations and legacy JSON import.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Subcommand;
use fitsync::legacy;
use fitsync::migration::{Migrator, MigratorTrait};

use crate::config::AppConfig;

#[derive(Debug, Clone, Subcommand)]
pub enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Show migration status
    Status,
    /// Drop all tables and reapply migrations
    Fresh,
    /// Import a legacy JSON state file into the catalog
    FromJson {
        /// Path to the legacy sync_database.json
        path: PathBuf,
    },
}

pub async fn handle_migrate(action: MigrateAction, config: &AppConfig) -> ExitCode {
    let db = match fitsync::connect(&config.database_url()).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open catalog: {e}");
            return ExitCode::from(1);
        }
    };

    let result = match action {
        MigrateAction::Up => Migrator::up(&db, None).await.map_err(|e| e.to_string()),
        MigrateAction::Status => Migrator::status(&db).await.map_err(|e| e.to_string()),
        MigrateAction::Fresh => Migrator::fresh(&db).await.map_err(|e| e.to_string()),
        MigrateAction::FromJson { path } => {
            // The import needs the schema in place first.
            if let Err(e) = Migrator::up(&db, None).await {
                eprintln!("Migration failed: {e}");
                return ExitCode::from(1);
            }
            match legacy::import_legacy_store(&db, &path).await {
                Ok(Some(report)) => {
                    println!(
                        "Imported {} activities, {} mappings, {} statuses, {} cache entries \
                         ({} rows skipped)",
                        report.activities,
                        report.mappings,
                        report.statuses,
                        report.cache_entries,
                        report.skipped
                    );
                    Ok(())
                }
                Ok(None) => Err(format!("no legacy store at {}", path.display())),
                Err(e) => Err(e.to_string()),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}
