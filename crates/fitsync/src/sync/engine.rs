//! The directional reconcile loop.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use thiserror::Error;

use crate::budget::{self, Admission};
use crate::cache::{CacheError, FileCacheStore};
use crate::catalog::{self, CatalogError, settings};
use crate::entity::file_format::FileFormat;
use crate::entity::platform::Platform;
use crate::entity::sync_state::SyncState;
use crate::fingerprint::{ActivityFacts, fingerprint};
use crate::matcher::{self, MatchVerdict, MatcherThresholds};
use crate::platform::{
    AdapterError, AdapterRegistry, PlatformAdapter, SourceActivity, UploadMetadata, UploadOutcome,
};
use crate::transcode::Transcoder;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{Direction, DirectionEnd, DirectionReport, SyncOptions};

/// Matcher candidate window when looking for a near-identical record whose
/// cached file can be reused.
const MATCH_CANDIDATE_WINDOW_HOURS: i64 = 1;

/// Everything a direction run needs, borrowed for the duration of the run.
pub struct SyncContext<'a> {
    pub db: &'a DatabaseConnection,
    pub registry: &'a AdapterRegistry,
    pub cache: &'a FileCacheStore,
    pub transcoder: &'a dyn Transcoder,
}

/// Process-fatal executor errors. Direction-level conditions (auth, rate
/// limit, listing failure) are reported in [`DirectionEnd`] instead, so the
/// remaining directions still run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no adapter registered for platform {0}")]
    MissingAdapter(Platform),
}

/// Tracks how far the cursor may advance: it follows the max start_time of
/// the contiguous terminal prefix, so a pending or failed-open tail is
/// re-enumerated on the next run.
struct CursorTracker {
    value: Option<DateTime<Utc>>,
    stalled: bool,
}

impl CursorTracker {
    fn new() -> Self {
        Self {
            value: None,
            stalled: false,
        }
    }

    fn terminal(&mut self, at: DateTime<Utc>) {
        if !self.stalled {
            self.value = Some(at);
        }
    }

    fn non_terminal(&mut self) {
        self.stalled = true;
    }
}

/// Outcome of processing a single activity.
enum ActivityEnd {
    /// Terminal status committed this run.
    Terminal(SyncState, Option<String>),
    /// Already settled by a previous run; advances the cursor but does not
    /// count as a state change.
    Unchanged,
    /// Pending status committed; the next run retries.
    Pending,
    /// The whole direction must stop.
    Stop(DirectionEnd),
}

/// Run one direction.
///
/// Enumerates the source window, resolves each activity against the
/// catalog, transfers what is missing on the target, and advances the
/// cursor over the committed prefix. Returns `Err` only for process-fatal
/// conditions (catalog corruption, unregistered platform).
#[tracing::instrument(skip(ctx, options, on_progress), fields(direction = %direction))]
pub async fn sync_direction(
    ctx: &SyncContext<'_>,
    direction: Direction,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<DirectionReport, SyncError> {
    let source = ctx
        .registry
        .get(direction.source)
        .ok_or(SyncError::MissingAdapter(direction.source))?
        .clone();
    let target = ctx
        .registry
        .get(direction.target)
        .ok_or(SyncError::MissingAdapter(direction.target))?
        .clone();

    let mut report = DirectionReport::new(direction);
    emit(on_progress, SyncProgress::DirectionStarted { direction });

    let now = Utc::now();
    let window_start = select_window_start(ctx.db, &direction, options, now).await?;
    emit(
        on_progress,
        SyncProgress::WindowSelected {
            direction,
            start: window_start,
            end: now,
            migration: options.migration_mode,
        },
    );

    // Every listing call is debited before it goes out.
    match budget::reserve(ctx.db, direction.source, source.info().list_cost).await? {
        Admission::Granted => {}
        Admission::Denied { retry_after } => {
            emit(
                on_progress,
                SyncProgress::RateLimitStop {
                    direction,
                    retry_after,
                },
            );
            report.end = DirectionEnd::RateLimited { retry_after };
            return Ok(report);
        }
    }

    let mut activities = match source
        .list_activities(window_start, now, options.batch_size)
        .await
    {
        Ok(activities) => activities,
        Err(err) => {
            report.end = direction_end_for(&err);
            return Ok(report);
        }
    };

    // Ascending start_time so the cursor can advance after partial progress.
    activities.sort_by_key(|a| a.start_time);
    activities.truncate(options.batch_size);
    report.listed = activities.len();
    emit(
        on_progress,
        SyncProgress::Listed {
            direction,
            count: activities.len(),
        },
    );

    if activities.is_empty() {
        // Nothing in the window and no error: safe to advance to now.
        advance_cursor(ctx.db, &direction, options, now).await?;
        emit(
            on_progress,
            SyncProgress::DirectionFinished {
                direction,
                counts: report.counts,
            },
        );
        return Ok(report);
    }

    let max_retries = match options.max_retries {
        Some(n) => n,
        None => settings::max_retries(ctx.db).await?,
    };
    let thresholds = settings::matcher_thresholds(ctx.db).await?;

    let mut cursor = CursorTracker::new();
    let total = activities.len();

    for (index, activity) in activities.iter().enumerate() {
        if options.cancel.is_cancelled() {
            report.end = DirectionEnd::Cancelled;
            break;
        }

        let facts = activity.facts();
        let fp = fingerprint(&facts);
        emit(
            on_progress,
            SyncProgress::ProcessingActivity {
                fingerprint: fp.clone(),
                name: activity.name.clone(),
                index: index + 1,
                total,
            },
        );

        let end = process_activity(
            ctx,
            &direction,
            source.as_ref(),
            target.as_ref(),
            activity,
            &facts,
            &fp,
            max_retries,
            &thresholds,
            on_progress,
        )
        .await?;

        match end {
            ActivityEnd::Terminal(state, reason) => {
                match state {
                    SyncState::Synced => report.counts.synced += 1,
                    SyncState::Duplicate => report.counts.duplicate += 1,
                    SyncState::Skipped => report.counts.skipped += 1,
                    SyncState::Failed => report.counts.failed += 1,
                    SyncState::Pending => {}
                }
                emit(
                    on_progress,
                    SyncProgress::ActivityOutcome {
                        fingerprint: fp,
                        state,
                        reason,
                    },
                );
                cursor.terminal(activity.start_time);
            }
            ActivityEnd::Unchanged => {
                cursor.terminal(activity.start_time);
            }
            ActivityEnd::Pending => {
                report.counts.pending += 1;
                emit(
                    on_progress,
                    SyncProgress::ActivityOutcome {
                        fingerprint: fp,
                        state: SyncState::Pending,
                        reason: None,
                    },
                );
                cursor.non_terminal();
            }
            ActivityEnd::Stop(end) => {
                if let DirectionEnd::RateLimited { retry_after } = &end {
                    emit(
                        on_progress,
                        SyncProgress::RateLimitStop {
                            direction,
                            retry_after: *retry_after,
                        },
                    );
                }
                report.end = end;
                break;
            }
        }
    }

    if let Some(at) = cursor.value {
        advance_cursor(ctx.db, &direction, options, at).await?;
    }

    emit(
        on_progress,
        SyncProgress::DirectionFinished {
            direction,
            counts: report.counts,
        },
    );
    Ok(report)
}

/// Process one activity through identify, decide, transfer, fetch, upload.
#[allow(clippy::too_many_arguments)]
async fn process_activity(
    ctx: &SyncContext<'_>,
    direction: &Direction,
    _source: &dyn PlatformAdapter,
    target: &dyn PlatformAdapter,
    activity: &SourceActivity,
    facts: &ActivityFacts,
    fp: &str,
    max_retries: i32,
    thresholds: &MatcherThresholds,
    on_progress: Option<&ProgressCallback>,
) -> Result<ActivityEnd, SyncError> {
    // Identify: record + source mapping commit together so no reader ever
    // sees a mapping without its parent.
    {
        let txn = ctx.db.begin().await.map_err(CatalogError::from)?;
        catalog::upsert_activity(&txn, fp, &activity.name, facts, activity.elevation_gain).await?;
        catalog::record_mapping(&txn, fp, direction.source, &activity.platform_id).await?;
        txn.commit().await.map_err(CatalogError::from)?;
    }

    // Decide.
    let status = catalog::get_status(ctx.db, fp, direction.source, direction.target).await?;
    if let Some(row) = &status {
        if row.status.is_terminal() {
            return Ok(ActivityEnd::Unchanged);
        }
        if row.retries >= max_retries {
            return mark_failed(ctx, direction, fp, "transport").await;
        }
    }

    if activity.manual {
        catalog::set_status_with_reason(
            ctx.db,
            fp,
            direction.source,
            direction.target,
            SyncState::Skipped,
            Some("no_source_file"),
        )
        .await?;
        return Ok(ActivityEnd::Terminal(
            SyncState::Skipped,
            Some("no_source_file".to_string()),
        ));
    }

    if catalog::get_mapping(ctx.db, fp, direction.target).await?.is_some() {
        // The target already holds it; record the fact without uploading.
        catalog::set_status(ctx.db, fp, direction.source, direction.target, SyncState::Synced)
            .await?;
        return Ok(ActivityEnd::Terminal(SyncState::Synced, None));
    }

    // A near-identical record may already hold a usable cached file.
    let file_fp = resolve_file_fingerprint(ctx, fp, facts, thresholds, on_progress).await?;

    // Choose the transfer format.
    let cached_formats: Vec<FileFormat> = catalog::cache_for(ctx.db, &file_fp)
        .await?
        .iter()
        .map(|e| e.file_format)
        .collect();
    let Some(format) = choose_format(
        &activity.available_formats,
        &cached_formats,
        &target.supported_upload_formats(),
        target.preferred_upload_format(),
        ctx.transcoder,
    ) else {
        return mark_failed(ctx, direction, fp, "no_compatible_format").await;
    };

    // Fetch.
    let path = match ctx
        .cache
        .ensure_file(
            ctx.db,
            ctx.registry,
            ctx.transcoder,
            &file_fp,
            format,
            Some(direction.source),
        )
        .await
    {
        Ok(path) => path,
        Err(CacheError::Adapter(AdapterError::NoOriginalFile { .. })) => {
            catalog::set_status_with_reason(
                ctx.db,
                fp,
                direction.source,
                direction.target,
                SyncState::Skipped,
                Some("no_source_file"),
            )
            .await?;
            return Ok(ActivityEnd::Terminal(
                SyncState::Skipped,
                Some("no_source_file".to_string()),
            ));
        }
        Err(CacheError::Adapter(AdapterError::Unauthorized)) => {
            return Ok(ActivityEnd::Stop(DirectionEnd::Unauthorized));
        }
        Err(CacheError::Adapter(AdapterError::RateLimited { reset_at })) => {
            return Ok(ActivityEnd::Stop(DirectionEnd::RateLimited {
                retry_after: retry_after_from(reset_at),
            }));
        }
        Err(CacheError::Adapter(AdapterError::NotFound { .. })) => {
            return mark_failed(ctx, direction, fp, "not_found").await;
        }
        Err(CacheError::Catalog(e)) => return Err(e.into()),
        Err(err) => {
            // Transport, transcode, io, or no source at all: transient.
            return mark_transient(ctx, direction, fp, max_retries, &err.to_string()).await;
        }
    };

    // Upload, debited before the call goes out.
    match budget::reserve(ctx.db, direction.target, target.info().upload_cost).await? {
        Admission::Granted => {}
        Admission::Denied { retry_after } => {
            return Ok(ActivityEnd::Stop(DirectionEnd::RateLimited { retry_after }));
        }
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => return mark_transient(ctx, direction, fp, max_retries, &e.to_string()).await,
    };

    let metadata = UploadMetadata {
        name: activity.name.clone(),
        sport: activity.sport,
        start_time: activity.start_time,
    };

    match target.upload(&bytes, format, &metadata).await {
        Ok(UploadOutcome::Accepted { remote_id }) => {
            // Status and target mapping commit together.
            let txn = ctx.db.begin().await.map_err(CatalogError::from)?;
            if !remote_id.is_empty() {
                catalog::record_mapping(&txn, fp, direction.target, &remote_id).await?;
            }
            catalog::set_status(&txn, fp, direction.source, direction.target, SyncState::Synced)
                .await?;
            txn.commit().await.map_err(CatalogError::from)?;
            Ok(ActivityEnd::Terminal(SyncState::Synced, None))
        }
        Ok(UploadOutcome::Duplicate) => {
            catalog::set_status(
                ctx.db,
                fp,
                direction.source,
                direction.target,
                SyncState::Duplicate,
            )
            .await?;
            Ok(ActivityEnd::Terminal(SyncState::Duplicate, None))
        }
        Ok(UploadOutcome::Rejected { reason }) => mark_failed(ctx, direction, fp, &reason).await,
        Ok(UploadOutcome::TransientError { message }) => {
            mark_transient(ctx, direction, fp, max_retries, &message).await
        }
        Err(AdapterError::Unauthorized) => Ok(ActivityEnd::Stop(DirectionEnd::Unauthorized)),
        Err(AdapterError::RateLimited { reset_at }) => {
            Ok(ActivityEnd::Stop(DirectionEnd::RateLimited {
                retry_after: retry_after_from(reset_at),
            }))
        }
        Err(err) if err.is_transient() => {
            mark_transient(ctx, direction, fp, max_retries, &err.to_string()).await
        }
        Err(err) => mark_failed(ctx, direction, fp, &err.to_string()).await,
    }
}

async fn mark_failed(
    ctx: &SyncContext<'_>,
    direction: &Direction,
    fp: &str,
    reason: &str,
) -> Result<ActivityEnd, SyncError> {
    catalog::set_status_with_reason(
        ctx.db,
        fp,
        direction.source,
        direction.target,
        SyncState::Failed,
        Some(reason),
    )
    .await?;
    Ok(ActivityEnd::Terminal(
        SyncState::Failed,
        Some(reason.to_string()),
    ))
}

async fn mark_transient(
    ctx: &SyncContext<'_>,
    direction: &Direction,
    fp: &str,
    max_retries: i32,
    message: &str,
) -> Result<ActivityEnd, SyncError> {
    tracing::debug!(fingerprint = fp, error = message, "Transient activity failure");
    let retries =
        catalog::increment_retry(ctx.db, fp, direction.source, direction.target).await?;
    if retries >= max_retries {
        return mark_failed(ctx, direction, fp, "transport").await;
    }
    catalog::set_status(
        ctx.db,
        fp,
        direction.source,
        direction.target,
        SyncState::Pending,
    )
    .await?;
    Ok(ActivityEnd::Pending)
}

fn retry_after_from(reset_at: Option<DateTime<Utc>>) -> Duration {
    reset_at
        .map(|t| (t - Utc::now()).max(Duration::zero()))
        .unwrap_or_else(|| Duration::minutes(15))
}

fn direction_end_for(err: &AdapterError) -> DirectionEnd {
    match err {
        AdapterError::Unauthorized => DirectionEnd::Unauthorized,
        AdapterError::RateLimited { reset_at } => DirectionEnd::RateLimited {
            retry_after: retry_after_from(*reset_at),
        },
        other => DirectionEnd::Failed {
            message: other.to_string(),
        },
    }
}

/// Window start per the cursor rules: first sync looks back a bounded
/// window, incremental syncs resume from the cursor minus overlap,
/// migration mode walks the full history from its own cursor.
async fn select_window_start(
    db: &DatabaseConnection,
    direction: &Direction,
    options: &SyncOptions,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SyncError> {
    if options.migration_mode {
        return Ok(match settings::migration_cursor(db, direction).await? {
            Some(cursor) => cursor - options.overlap,
            None => DateTime::<Utc>::UNIX_EPOCH,
        });
    }

    Ok(match settings::last_cursor(db, direction.source).await? {
        Some(cursor) => cursor - options.overlap,
        None => now - options.initial_window,
    })
}

async fn advance_cursor(
    db: &DatabaseConnection,
    direction: &Direction,
    options: &SyncOptions,
    to: DateTime<Utc>,
) -> Result<(), SyncError> {
    if options.migration_mode {
        settings::set_migration_cursor(db, direction, to).await?;
    } else {
        settings::set_last_cursor(db, direction.source, to).await?;
    }
    Ok(())
}

/// Pick the transfer format: first format in the preference order that the
/// destination accepts and that is obtainable, either directly (source or
/// cache has it) or through a supported conversion.
fn choose_format(
    available: &[FileFormat],
    cached: &[FileFormat],
    dest_supported: &[FileFormat],
    dest_preference: Option<FileFormat>,
    transcoder: &dyn Transcoder,
) -> Option<FileFormat> {
    let mut order: Vec<FileFormat> = Vec::with_capacity(4);
    if let Some(pref) = dest_preference {
        order.push(pref);
    }
    for fmt in FileFormat::PREFERENCE {
        if !order.contains(&fmt) {
            order.push(fmt);
        }
    }

    let obtainable: Vec<FileFormat> = available
        .iter()
        .chain(cached.iter())
        .copied()
        .collect();

    for fmt in order {
        if !dest_supported.contains(&fmt) {
            continue;
        }
        if obtainable.contains(&fmt) {
            return Some(fmt);
        }
        if obtainable.iter().any(|&a| transcoder.supports(a, fmt)) {
            return Some(fmt);
        }
    }

    None
}

/// If this fingerprint has no cached file, look for a near-identical
/// catalog record (same sport, start within an hour) whose cache can be
/// reused. Only confident matches are used; ambiguous ones are surfaced
/// and left alone.
async fn resolve_file_fingerprint(
    ctx: &SyncContext<'_>,
    fp: &str,
    facts: &ActivityFacts,
    thresholds: &MatcherThresholds,
    on_progress: Option<&ProgressCallback>,
) -> Result<String, SyncError> {
    if !catalog::cache_for(ctx.db, fp).await?.is_empty() {
        return Ok(fp.to_string());
    }

    let candidates = catalog::find_candidates(
        ctx.db,
        facts.sport,
        facts.start_time,
        Duration::hours(MATCH_CANDIDATE_WINDOW_HOURS),
    )
    .await?;

    let mut best: Option<(String, f64)> = None;
    for candidate in candidates.iter().filter(|c| c.fingerprint != fp) {
        let result = matcher::score(facts, &ActivityFacts::from(candidate), thresholds);
        match result.verdict {
            MatchVerdict::Match => {
                if catalog::cache_for(ctx.db, &candidate.fingerprint).await?.is_empty() {
                    continue;
                }
                let better = best.as_ref().is_none_or(|(_, s)| result.score > *s);
                if better {
                    best = Some((candidate.fingerprint.clone(), result.score));
                }
            }
            MatchVerdict::Ambiguous => {
                tracing::info!(
                    fingerprint = fp,
                    candidate = %candidate.fingerprint,
                    score = result.score,
                    "Ambiguous activity match, not linking"
                );
                emit(
                    on_progress,
                    SyncProgress::AmbiguousMatch {
                        fingerprint: fp.to_string(),
                        candidate: candidate.fingerprint.clone(),
                        score: result.score,
                    },
                );
            }
            MatchVerdict::NoMatch => {}
        }
    }

    match best {
        Some((matched, score)) => {
            tracing::debug!(
                fingerprint = fp,
                matched = %matched,
                score,
                "Reusing cached file from matched activity"
            );
            Ok(matched)
        }
        None => Ok(fp.to_string()),
    }
}
