//! Sync state enum for per-direction activity status tracking.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// State of one activity along one `(source, destination)` direction.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Scheduled or awaiting retry.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Uploaded and accepted by the destination.
    #[sea_orm(string_value = "synced")]
    Synced,
    /// Intentionally not transferred (e.g. manual activity with no file).
    #[sea_orm(string_value = "skipped")]
    Skipped,
    /// Transfer failed and will not be retried.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Destination reported it already holds the activity. Treated as success.
    #[sea_orm(string_value = "duplicate")]
    Duplicate,
}

impl SyncState {
    /// Terminal states are never reset back to `Pending` except by an
    /// explicit administrative clear.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SyncState::Pending)
    }

    /// States that count as a completed transfer when deciding whether a
    /// direction still owes work for an activity.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            SyncState::Synced | SyncState::Duplicate | SyncState::Skipped
        )
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
            SyncState::Skipped => "skipped",
            SyncState::Failed => "failed",
            SyncState::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}
