//! Integration tests for the catalog store over an in-memory SQLite
//! database.

use chrono::{Duration, TimeZone, Utc};
use sea_orm::DatabaseConnection;

use fitsync::catalog::{self, settings};
use fitsync::connect_and_migrate;
use fitsync::entity::prelude::*;
use fitsync::fingerprint::ActivityFacts;

async fn setup_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("in-memory catalog should migrate")
}

fn ride_facts() -> ActivityFacts {
    ActivityFacts {
        sport: Sport::Ride,
        start_time: Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap(),
        distance: 20034.0,
        duration: 3612,
    }
}

async fn seed_activity(db: &DatabaseConnection, fp: &str) {
    catalog::upsert_activity(db, fp, "Morning Ride", &ride_facts(), Some(250.0))
        .await
        .expect("activity should upsert");
}

#[tokio::test]
async fn upsert_activity_is_idempotent_and_preserves_created_at() {
    let db = setup_db().await;

    let first = catalog::upsert_activity(&db, "fp1", "Morning Ride", &ride_facts(), None)
        .await
        .unwrap();
    let second = catalog::upsert_activity(&db, "fp1", "Morning Ride", &ride_facts(), None)
        .await
        .unwrap();

    assert_eq!(first.created_at, second.created_at);
    assert_eq!(second.name, "Morning Ride");

    // Re-observation refreshes metadata in place.
    let renamed = catalog::upsert_activity(&db, "fp1", "Commute", &ride_facts(), Some(10.0))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Commute");
    assert_eq!(renamed.created_at, first.created_at);
    assert_eq!(renamed.elevation_gain, Some(10.0));
}

#[tokio::test]
async fn record_mapping_round_trips_and_stays_unique() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;

    catalog::record_mapping(&db, "fp1", Platform::Strava, "S1")
        .await
        .unwrap();
    let mapping = catalog::get_mapping(&db, "fp1", Platform::Strava)
        .await
        .unwrap()
        .expect("mapping should exist");
    assert_eq!(mapping.activity_id, "S1");

    // Upsert on the same pair overwrites instead of growing a second row.
    catalog::record_mapping(&db, "fp1", Platform::Strava, "S1-renumbered")
        .await
        .unwrap();
    let mappings = catalog::mappings_for(&db, "fp1").await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].activity_id, "S1-renumbered");
}

#[tokio::test]
async fn reverse_lookup_finds_the_fingerprint() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;
    catalog::record_mapping(&db, "fp1", Platform::Garmin, "G42")
        .await
        .unwrap();

    let found = catalog::find_by_platform_id(&db, Platform::Garmin, "G42")
        .await
        .unwrap()
        .expect("reverse lookup should hit");
    assert_eq!(found.fingerprint, "fp1");

    assert!(
        catalog::find_by_platform_id(&db, Platform::Strava, "G42")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn settled_statuses_never_regress() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;

    catalog::set_status(&db, "fp1", Platform::Strava, Platform::Garmin, SyncState::Synced)
        .await
        .unwrap();

    // Marking synced twice is a no-op.
    let again =
        catalog::set_status(&db, "fp1", Platform::Strava, Platform::Garmin, SyncState::Synced)
            .await
            .unwrap();
    assert_eq!(again.status, SyncState::Synced);

    // A settled row shrugs off any downgrade attempt.
    for downgrade in [SyncState::Pending, SyncState::Failed, SyncState::Skipped] {
        let row = catalog::set_status(&db, "fp1", Platform::Strava, Platform::Garmin, downgrade)
            .await
            .unwrap();
        assert_eq!(row.status, SyncState::Synced);
    }

    // The administrative clear is the only way back.
    assert!(
        catalog::clear_status(&db, "fp1", Platform::Strava, Platform::Garmin)
            .await
            .unwrap()
    );
    assert!(
        catalog::get_status(&db, "fp1", Platform::Strava, Platform::Garmin)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn status_rows_are_scoped_per_direction() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;

    catalog::set_status(&db, "fp1", Platform::Strava, Platform::Garmin, SyncState::Synced)
        .await
        .unwrap();
    catalog::set_status(&db, "fp1", Platform::Strava, Platform::Onedrive, SyncState::Pending)
        .await
        .unwrap();

    let garmin = catalog::get_status(&db, "fp1", Platform::Strava, Platform::Garmin)
        .await
        .unwrap()
        .unwrap();
    let onedrive = catalog::get_status(&db, "fp1", Platform::Strava, Platform::Onedrive)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(garmin.status, SyncState::Synced);
    assert_eq!(onedrive.status, SyncState::Pending);
}

#[tokio::test]
async fn list_pending_respects_limit_and_direction() {
    let db = setup_db().await;
    for i in 0..5 {
        let fp = format!("fp{i}");
        seed_activity(&db, &fp).await;
        catalog::set_status(&db, &fp, Platform::Strava, Platform::Garmin, SyncState::Pending)
            .await
            .unwrap();
    }
    seed_activity(&db, "other").await;
    catalog::set_status(
        &db,
        "other",
        Platform::Garmin,
        Platform::Strava,
        SyncState::Pending,
    )
    .await
    .unwrap();

    let pending = catalog::list_pending(&db, Platform::Strava, Platform::Garmin, 3)
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|p| p.source_platform == Platform::Strava));
}

#[tokio::test]
async fn cache_rows_round_trip_and_purge() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;

    catalog::record_cache(&db, "fp1", FileFormat::Fit, "/tmp/fp1.fit", 1024)
        .await
        .unwrap();
    let entry = catalog::get_cache(&db, "fp1", FileFormat::Fit)
        .await
        .unwrap()
        .expect("cache row should exist");
    assert_eq!(entry.file_path, "/tmp/fp1.fit");
    assert_eq!(entry.file_size, 1024);

    // purge_cache(0) removes everything and returns the removed rows.
    let removed = catalog::purge_cache_older_than(&db, Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert!(
        catalog::get_cache(&db, "fp1", FileFormat::Fit)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn candidate_search_is_bounded_by_time_and_sport() {
    let db = setup_db().await;

    let base = ride_facts();
    catalog::upsert_activity(&db, "close", "Ride A", &base, None)
        .await
        .unwrap();

    let nearby = ActivityFacts {
        start_time: base.start_time + Duration::minutes(30),
        ..base
    };
    catalog::upsert_activity(&db, "nearby", "Ride B", &nearby, None)
        .await
        .unwrap();

    let far = ActivityFacts {
        start_time: base.start_time + Duration::hours(5),
        ..base
    };
    catalog::upsert_activity(&db, "far", "Ride C", &far, None)
        .await
        .unwrap();

    let run = ActivityFacts {
        sport: Sport::Run,
        ..base
    };
    catalog::upsert_activity(&db, "run", "Run", &run, None)
        .await
        .unwrap();

    let candidates =
        catalog::find_candidates(&db, Sport::Ride, base.start_time, Duration::hours(1))
            .await
            .unwrap();
    let names: Vec<&str> = candidates.iter().map(|c| c.fingerprint.as_str()).collect();
    assert_eq!(names, vec!["close", "nearby"]);
}

#[tokio::test]
async fn settings_cursors_round_trip() {
    let db = setup_db().await;

    assert!(
        settings::last_cursor(&db, Platform::Strava)
            .await
            .unwrap()
            .is_none()
    );

    let cursor = Utc.with_ymd_and_hms(2025, 1, 10, 6, 0, 0).unwrap();
    settings::set_last_cursor(&db, Platform::Strava, cursor)
        .await
        .unwrap();
    assert_eq!(
        settings::last_cursor(&db, Platform::Strava).await.unwrap(),
        Some(cursor)
    );

    // Settings are per platform.
    assert!(
        settings::last_cursor(&db, Platform::Garmin)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn statistics_aggregate_the_catalog() {
    let db = setup_db().await;
    seed_activity(&db, "fp1").await;
    seed_activity(&db, "fp2").await;

    catalog::record_mapping(&db, "fp1", Platform::Strava, "S1")
        .await
        .unwrap();
    catalog::record_mapping(&db, "fp2", Platform::Strava, "S2")
        .await
        .unwrap();
    catalog::record_mapping(&db, "fp1", Platform::Garmin, "G1")
        .await
        .unwrap();
    catalog::set_status(&db, "fp1", Platform::Strava, Platform::Garmin, SyncState::Synced)
        .await
        .unwrap();
    catalog::set_status(&db, "fp2", Platform::Strava, Platform::Garmin, SyncState::Skipped)
        .await
        .unwrap();

    let stats = catalog::collect_statistics(&db).await.unwrap();
    assert_eq!(stats.total_activities, 2);
    assert_eq!(stats.platform_counts[&Platform::Strava], 2);
    assert_eq!(stats.platform_counts[&Platform::Garmin], 1);

    let counts = &stats.direction_counts[&(Platform::Strava, Platform::Garmin)];
    assert_eq!(counts.synced, 1);
    assert_eq!(counts.skipped, 1);
    assert_eq!(counts.total(), 2);
}
