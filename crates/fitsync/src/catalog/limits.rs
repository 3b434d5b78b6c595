use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set};

use crate::entity::api_limit::{ActiveModel, Entity as ApiLimit, Model};
use crate::entity::platform::Platform;

use super::errors::{CatalogError, Result};

// ─── API Counters ────────────────────────────────────────────────────────────
//
// Plain row accessors; the window arithmetic (lazy decay, admission) lives
// in `crate::budget` so the storage layer stays policy-free.

/// Fetch the counter row for a platform.
pub async fn get_api<C: ConnectionTrait>(db: &C, platform: Platform) -> Result<Option<Model>> {
    ApiLimit::find_by_id(platform)
        .one(db)
        .await
        .map_err(CatalogError::from)
}

/// Insert or fully replace a counter row.
pub async fn put_api<C: ConnectionTrait>(db: &C, model: Model) -> Result<Model> {
    let exists = ApiLimit::find_by_id(model.platform).one(db).await?.is_some();

    if exists {
        let update: ActiveModel = {
            let mut am = model.clone().into_active_model();
            am.daily_calls = Set(model.daily_calls);
            am.quarter_hour_calls = Set(model.quarter_hour_calls);
            am.daily_limit = Set(model.daily_limit);
            am.quarter_hour_limit = Set(model.quarter_hour_limit);
            am.daily_reset_at = Set(model.daily_reset_at);
            am.quarter_hour_reset_at = Set(model.quarter_hour_reset_at);
            am
        };
        update.update(db).await.map_err(CatalogError::from)
    } else {
        let insert = ActiveModel {
            platform: Set(model.platform),
            daily_calls: Set(model.daily_calls),
            quarter_hour_calls: Set(model.quarter_hour_calls),
            daily_limit: Set(model.daily_limit),
            quarter_hour_limit: Set(model.quarter_hour_limit),
            daily_reset_at: Set(model.daily_reset_at),
            quarter_hour_reset_at: Set(model.quarter_hour_reset_at),
        };
        insert.insert(db).await.map_err(CatalogError::from)
    }
}

/// Zero the 15-minute window counter, leaving the daily counter alone.
pub async fn reset_api_window<C: ConnectionTrait>(db: &C, platform: Platform) -> Result<()> {
    if let Some(existing) = get_api(db, platform).await? {
        let mut update = existing.into_active_model();
        update.quarter_hour_calls = Set(0);
        update.update(db).await?;
    }
    Ok(())
}
