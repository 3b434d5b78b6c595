//! SeaORM entity definitions for the sync catalog schema.

pub mod activity_record;
pub mod api_limit;
pub mod file_cache;
pub mod file_format;
pub mod platform;
pub mod platform_mapping;
pub mod sport;
pub mod sync_config;
pub mod sync_state;
pub mod sync_status;

pub mod prelude;
