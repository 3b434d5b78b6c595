use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

use crate::entity::file_cache::{ActiveModel, Column, Entity as FileCache, Model};
use crate::entity::file_format::FileFormat;

use super::errors::{CatalogError, Result};

// ─── File Cache Rows ─────────────────────────────────────────────────────────
//
// Only the bookkeeping lives here; the bytes on disk are owned by
// `crate::cache`. Rows are advisory: a row whose file is gone is removed by
// the sweep, and a deleted row only costs a re-download.

/// Register a cached file for `(fingerprint, format)`, replacing any
/// previous entry for the pair.
pub async fn record_cache<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    format: FileFormat,
    file_path: &str,
    file_size: i64,
) -> Result<()> {
    let model = ActiveModel {
        fingerprint: Set(fingerprint.to_string()),
        file_format: Set(format),
        file_path: Set(file_path.to_string()),
        file_size: Set(file_size),
        created_at: Set(Utc::now().fixed_offset()),
    };

    FileCache::insert(model)
        .on_conflict(
            OnConflict::columns([Column::Fingerprint, Column::FileFormat])
                .update_columns([Column::FilePath, Column::FileSize, Column::CreatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

/// Fetch the cache entry for `(fingerprint, format)`.
pub async fn get_cache<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    format: FileFormat,
) -> Result<Option<Model>> {
    FileCache::find_by_id((fingerprint.to_string(), format))
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// All cached formats for one activity.
pub async fn cache_for<C: ConnectionTrait>(db: &C, fingerprint: &str) -> Result<Vec<Model>> {
    FileCache::find()
        .filter(Column::Fingerprint.eq(fingerprint))
        .all(db)
        .await
        .map_err(CatalogError::from)
}

/// Every cache row. Used by the startup sweep to drop dangling entries.
pub async fn all_cache<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>> {
    FileCache::find().all(db).await.map_err(CatalogError::from)
}

/// Remove one cache row. Returns whether a row existed.
pub async fn remove_cache<C: ConnectionTrait>(
    db: &C,
    fingerprint: &str,
    format: FileFormat,
) -> Result<bool> {
    let result = FileCache::delete_by_id((fingerprint.to_string(), format))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Delete rows whose `created_at` precedes `cutoff` and return them so the
/// caller can unlink the files.
pub async fn purge_cache_older_than<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Model>> {
    let cutoff = cutoff.fixed_offset();

    let expired = FileCache::find()
        .filter(Column::CreatedAt.lt(cutoff))
        .all(db)
        .await?;

    if !expired.is_empty() {
        FileCache::delete_many()
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(db)
            .await?;
    }

    Ok(expired)
}
