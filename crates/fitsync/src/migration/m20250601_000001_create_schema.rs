//! Initial migration to create the sync catalog schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_activity_records(manager).await?;
        self.create_platform_mappings(manager).await?;
        self.create_sync_status(manager).await?;
        self.create_file_cache(manager).await?;
        self.create_sync_config(manager).await?;
        self.create_api_limits(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiLimits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncConfig::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FileCache::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlatformMappings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivityRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_activity_records(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivityRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityRecords::Fingerprint)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActivityRecords::Name).string().not_null())
                    .col(
                        ColumnDef::new(ActivityRecords::SportType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityRecords::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityRecords::Distance).double().not_null())
                    .col(
                        ColumnDef::new(ActivityRecords::Duration)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityRecords::ElevationGain).double().null())
                    .col(
                        ColumnDef::new(ActivityRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Matcher candidate lookup scans by start time and sport
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_records_start_sport")
                    .table(ActivityRecords::Table)
                    .col(ActivityRecords::StartTime)
                    .col(ActivityRecords::SportType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_platform_mappings(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlatformMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlatformMappings::Fingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlatformMappings::Platform)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlatformMappings::ActivityId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlatformMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PlatformMappings::Fingerprint)
                            .col(PlatformMappings::Platform),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_platform_mappings_fingerprint")
                            .from(PlatformMappings::Table, PlatformMappings::Fingerprint)
                            .to(ActivityRecords::Table, ActivityRecords::Fingerprint),
                    )
                    .to_owned(),
            )
            .await?;

        // Reverse lookup: which fingerprint does this platform id belong to?
        manager
            .create_index(
                Index::create()
                    .name("idx_platform_mappings_platform_id")
                    .table(PlatformMappings::Table)
                    .col(PlatformMappings::Platform)
                    .col(PlatformMappings::ActivityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_status(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncStatus::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncStatus::Fingerprint).string().not_null())
                    .col(
                        ColumnDef::new(SyncStatus::SourcePlatform)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncStatus::TargetPlatform)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncStatus::Status).string().not_null())
                    .col(ColumnDef::new(SyncStatus::Reason).string().null())
                    .col(
                        ColumnDef::new(SyncStatus::Retries)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncStatus::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(SyncStatus::Fingerprint)
                            .col(SyncStatus::SourcePlatform)
                            .col(SyncStatus::TargetPlatform),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_status_fingerprint")
                            .from(SyncStatus::Table, SyncStatus::Fingerprint)
                            .to(ActivityRecords::Table, ActivityRecords::Fingerprint),
                    )
                    .to_owned(),
            )
            .await?;

        // Pending-work scan per direction
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_status_direction_status")
                    .table(SyncStatus::Table)
                    .col(SyncStatus::SourcePlatform)
                    .col(SyncStatus::TargetPlatform)
                    .col(SyncStatus::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_file_cache(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileCache::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FileCache::Fingerprint).string().not_null())
                    .col(ColumnDef::new(FileCache::FileFormat).string().not_null())
                    .col(ColumnDef::new(FileCache::FilePath).text().not_null())
                    .col(
                        ColumnDef::new(FileCache::FileSize)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FileCache::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(FileCache::Fingerprint)
                            .col(FileCache::FileFormat),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_cache_fingerprint")
                            .from(FileCache::Table, FileCache::Fingerprint)
                            .to(ActivityRecords::Table, ActivityRecords::Fingerprint),
                    )
                    .to_owned(),
            )
            .await?;

        // TTL sweep scans by age
        manager
            .create_index(
                Index::create()
                    .name("idx_file_cache_created_at")
                    .table(FileCache::Table)
                    .col(FileCache::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_config(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncConfig::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncConfig::Value).text().not_null())
                    .col(
                        ColumnDef::new(SyncConfig::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_api_limits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiLimits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiLimits::Platform)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ApiLimits::DailyCalls)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ApiLimits::QuarterHourCalls)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ApiLimits::DailyLimit).integer().not_null())
                    .col(
                        ColumnDef::new(ApiLimits::QuarterHourLimit)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiLimits::DailyResetAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApiLimits::QuarterHourResetAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ActivityRecords {
    Table,
    Fingerprint,
    Name,
    SportType,
    StartTime,
    Distance,
    Duration,
    ElevationGain,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PlatformMappings {
    Table,
    Fingerprint,
    Platform,
    ActivityId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SyncStatus {
    Table,
    Fingerprint,
    SourcePlatform,
    TargetPlatform,
    Status,
    Reason,
    Retries,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FileCache {
    Table,
    Fingerprint,
    FileFormat,
    FilePath,
    FileSize,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SyncConfig {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApiLimits {
    Table,
    Platform,
    DailyCalls,
    QuarterHourCalls,
    DailyLimit,
    QuarterHourLimit,
    DailyResetAt,
    QuarterHourResetAt,
}
