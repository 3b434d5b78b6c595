use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

use crate::entity::activity_record::Entity as ActivityRecord;
use crate::entity::file_cache::Entity as FileCache;
use crate::entity::platform::Platform;
use crate::entity::platform_mapping::{Column as MappingColumn, Entity as PlatformMapping};
use crate::entity::sync_state::SyncState;
use crate::entity::sync_status::Entity as SyncStatus;

use super::errors::Result;

/// Per-direction breakdown of sync states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionCounts {
    pub pending: u64,
    pub synced: u64,
    pub skipped: u64,
    pub failed: u64,
    pub duplicate: u64,
}

impl DirectionCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pending + self.synced + self.skipped + self.failed + self.duplicate
    }
}

/// Snapshot of catalog-wide counters backing the status command.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub total_activities: u64,
    /// Mapped activity count per platform.
    pub platform_counts: HashMap<Platform, u64>,
    /// State breakdown per `(source, target)` direction.
    pub direction_counts: HashMap<(Platform, Platform), DirectionCounts>,
    pub cache_files: u64,
    pub cache_bytes: u64,
}

/// Collect catalog statistics in one pass over the small tables.
pub async fn collect_statistics<C: ConnectionTrait>(db: &C) -> Result<Statistics> {
    let mut stats = Statistics {
        total_activities: ActivityRecord::find().count(db).await?,
        ..Statistics::default()
    };

    for platform in Platform::ALL {
        let count = PlatformMapping::find()
            .filter(MappingColumn::Platform.eq(platform))
            .count(db)
            .await?;
        if count > 0 {
            stats.platform_counts.insert(platform, count);
        }
    }

    for row in SyncStatus::find().all(db).await? {
        let counts = stats
            .direction_counts
            .entry((row.source_platform, row.target_platform))
            .or_default();
        match row.status {
            SyncState::Pending => counts.pending += 1,
            SyncState::Synced => counts.synced += 1,
            SyncState::Skipped => counts.skipped += 1,
            SyncState::Failed => counts.failed += 1,
            SyncState::Duplicate => counts.duplicate += 1,
        }
    }

    for entry in FileCache::find().all(db).await? {
        stats.cache_files += 1;
        stats.cache_bytes += entry.file_size.max(0) as u64;
    }

    Ok(stats)
}
