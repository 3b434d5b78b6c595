use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entity::platform::Platform;
use crate::entity::sync_state::SyncState;
use crate::entity::sync_status::{ActiveModel, Column, Entity as SyncStatus, Model};

use super::errors::{CatalogError, Result};

// ─── Sync Status ─────────────────────────────────────────────────────────────

/// Fetch the status row for one activity along one direction.
pub async fn get_status<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    source: Platform,
    target: Platform,
) -> Result<Option<Model>> {
    SyncStatus::find_by_id((fingerprint.to_string(), source, target))
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// Set the status of one activity along one direction.
///
/// Idempotent under retry: writing the state a row already has is a no-op.
/// Settled outcomes never regress - once a row is `Synced` or `Duplicate`,
/// later writes are ignored (the only way back is [`clear_status`]).
pub async fn set_status<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    source: Platform,
    target: Platform,
    state: SyncState,
) -> Result<Model> {
    set_status_with_reason(db, fingerprint, source, target, state, None).await
}

/// [`set_status`] with a reason string (`no_source_file`, `not_found`,
/// upload rejection text, ...).
pub async fn set_status_with_reason<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    source: Platform,
    target: Platform,
    state: SyncState,
    reason: Option<&str>,
) -> Result<Model> {
    let now = Utc::now().fixed_offset();
    let existing = get_status(db, fingerprint, source, target).await?;

    match existing {
        Some(existing) => {
            let frozen = matches!(existing.status, SyncState::Synced | SyncState::Duplicate);
            if frozen || (existing.status == state && existing.reason.as_deref() == reason) {
                return Ok(existing);
            }

            let mut update: ActiveModel = existing.into();
            update.status = Set(state);
            update.reason = Set(reason.map(str::to_string));
            update.updated_at = Set(now);
            update.update(db).await.map_err(CatalogError::from)
        }
        None => {
            let insert = ActiveModel {
                fingerprint: Set(fingerprint.to_string()),
                source_platform: Set(source),
                target_platform: Set(target),
                status: Set(state),
                reason: Set(reason.map(str::to_string)),
                retries: Set(0),
                updated_at: Set(now),
            };
            insert.insert(db).await.map_err(CatalogError::from)
        }
    }
}

/// Bump the transient-retry counter of a pending row and return the new
/// count. Creates the row as `Pending` if it does not exist.
pub async fn increment_retry<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    source: Platform,
    target: Platform,
) -> Result<i32> {
    let existing = get_status(db, fingerprint, source, target).await?;

    match existing {
        Some(existing) => {
            let retries = existing.retries + 1;
            let mut update: ActiveModel = existing.into();
            update.retries = Set(retries);
            update.updated_at = Set(Utc::now().fixed_offset());
            update.update(db).await?;
            Ok(retries)
        }
        None => {
            let insert = ActiveModel {
                fingerprint: Set(fingerprint.to_string()),
                source_platform: Set(source),
                target_platform: Set(target),
                status: Set(SyncState::Pending),
                reason: Set(None),
                retries: Set(1),
                updated_at: Set(Utc::now().fixed_offset()),
            };
            insert.insert(db).await?;
            Ok(1)
        }
    }
}

/// Administrative reset: delete the status row so the activity is
/// re-evaluated on the next run. This is the only path out of a settled
/// state.
pub async fn clear_status<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    source: Platform,
    target: Platform,
) -> Result<bool> {
    let result = SyncStatus::delete_by_id((fingerprint.to_string(), source, target))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Pending activities for a direction, oldest first.
pub async fn list_pending<C: ConnectionTrait>(
    db: &C,
    source: Platform,
    target: Platform,
    limit: u64,
) -> Result<Vec<Model>> {
    SyncStatus::find()
        .filter(Column::SourcePlatform.eq(source))
        .filter(Column::TargetPlatform.eq(target))
        .filter(Column::Status.eq(SyncState::Pending))
        .order_by_asc(Column::UpdatedAt)
        .limit(limit)
        .all(db)
        .await
        .map_err(CatalogError::from)
}
