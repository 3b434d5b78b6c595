//! The `status` command: catalog statistics and budget headroom.

use std::process::ExitCode;

use console::style;
use sea_orm::DatabaseConnection;

use fitsync::catalog::{collect_statistics, settings};
use fitsync::{Platform, budget, connect_and_migrate};

use crate::config::AppConfig;

pub async fn handle_status(config: &AppConfig) -> ExitCode {
    let db = match connect_and_migrate(&config.database_url()).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open catalog: {e}");
            return ExitCode::from(1);
        }
    };

    let code = print_status(&db).await;
    print_health(config).await;
    code
}

/// Probe every configured adapter.
async fn print_health(config: &AppConfig) {
    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    if registry.platforms().is_empty() {
        return;
    }

    println!("\n{}", style("Platform health").bold());
    for platform in registry.platforms() {
        if let Some(adapter) = registry.get(platform) {
            let health = adapter.health_check().await;
            let rendered = match health {
                fitsync::Health::Ok => style("ok").green(),
                fitsync::Health::Degraded => style("degraded").yellow(),
                fitsync::Health::Down => style("down").red(),
            };
            println!("  {platform}: {rendered}");
        }
    }
}

pub async fn print_status(db: &DatabaseConnection) -> ExitCode {
    let stats = match collect_statistics(db).await {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Catalog error: {e}");
            return ExitCode::from(1);
        }
    };

    println!("{}", style("Catalog").bold());
    println!("  activities: {}", stats.total_activities);
    println!(
        "  cache:      {} files, {} KiB",
        stats.cache_files,
        stats.cache_bytes / 1024
    );

    if !stats.platform_counts.is_empty() {
        println!("\n{}", style("Mapped activities per platform").bold());
        for platform in Platform::ALL {
            if let Some(count) = stats.platform_counts.get(&platform) {
                println!("  {platform}: {count}");
            }
        }
    }

    if !stats.direction_counts.is_empty() {
        println!("\n{}", style("Directions").bold());
        let mut directions: Vec<_> = stats.direction_counts.iter().collect();
        directions.sort_by_key(|((s, t), _)| (s.as_str(), t.as_str()));
        for ((source, target), counts) in directions {
            println!(
                "  {source} -> {target}: {} synced, {} duplicate, {} skipped, {} failed, {} pending",
                counts.synced, counts.duplicate, counts.skipped, counts.failed, counts.pending
            );
        }
    }

    println!("\n{}", style("Cursors").bold());
    for platform in Platform::ALL {
        match settings::last_cursor(db, platform).await {
            Ok(Some(cursor)) => println!("  {platform}: {cursor}"),
            Ok(None) => {}
            Err(e) => {
                eprintln!("Catalog error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    println!("\n{}", style("API budget headroom").bold());
    for platform in Platform::ALL {
        match budget::headroom(db, platform).await {
            Ok(Some((daily, quarter))) => {
                println!("  {platform}: {daily} today, {quarter} this quarter hour");
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Catalog error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    ExitCode::SUCCESS
}
