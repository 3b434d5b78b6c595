//! Common re-exports for convenient entity usage.

pub use super::activity_record::{
    ActiveModel as ActivityRecordActiveModel, Column as ActivityRecordColumn,
    Entity as ActivityRecord, Model as ActivityRecordModel,
};
pub use super::api_limit::{
    ActiveModel as ApiLimitActiveModel, Column as ApiLimitColumn, Entity as ApiLimit,
    Model as ApiLimitModel,
};
pub use super::file_cache::{
    ActiveModel as FileCacheActiveModel, Column as FileCacheColumn, Entity as FileCache,
    Model as FileCacheModel,
};
pub use super::file_format::FileFormat;
pub use super::platform::Platform;
pub use super::platform_mapping::{
    ActiveModel as PlatformMappingActiveModel, Column as PlatformMappingColumn,
    Entity as PlatformMapping, Model as PlatformMappingModel,
};
pub use super::sport::Sport;
pub use super::sync_config::{
    ActiveModel as SyncConfigActiveModel, Column as SyncConfigColumn, Entity as SyncConfig,
    Model as SyncConfigModel,
};
pub use super::sync_state::SyncState;
pub use super::sync_status::{
    ActiveModel as SyncStatusActiveModel, Column as SyncStatusColumn, Entity as SyncStatus,
    Model as SyncStatusModel,
};
