//! Per-platform API budget admission control.
//!
//! Platforms with hard API quotas (critically Strava's 15-minute and daily
//! caps) get a durable pair of rolling counters in the `api_limits` table.
//! Before every outbound call the executor asks [`reserve`] for admission;
//! a denial carries the time until the blocking window rolls over, and the
//! executor ends the direction instead of busy-waiting.
//!
//! The governor is lazy: expired windows are reset on the next reservation,
//! so no background timer exists. Counters are updated in the same
//! transaction that admits the call when the caller passes one.

use chrono::{DateTime, Duration, Utc};
use sea_orm::ConnectionTrait;

use crate::catalog::{self, Result};
use crate::entity::api_limit::Model as ApiLimitModel;
use crate::entity::platform::Platform;

fn daily_window() -> Duration {
    Duration::hours(24)
}

fn quarter_hour_window() -> Duration {
    Duration::minutes(15)
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed; counters have been debited.
    Granted,
    /// A window is exhausted. `retry_after` is the time until it resets.
    Denied { retry_after: Duration },
}

impl Admission {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Call budget for one platform, margins already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetCaps {
    pub daily: i32,
    pub quarter_hour: i32,
}

/// Built-in budgets. Strava's true caps are 200/day and 100/15 min; the
/// stored caps keep a safety margin so interactive use of the same token
/// does not push the account over. Platforms without published quotas are
/// unmetered.
#[must_use]
pub fn default_caps(platform: Platform) -> Option<BudgetCaps> {
    match platform {
        Platform::Strava => Some(BudgetCaps {
            daily: 180,
            quarter_hour: 90,
        }),
        _ => None,
    }
}

/// Effective budget for a platform: built-in defaults overridden by
/// `rate_daily_limit_<platform>` / `rate_quarter_hour_limit_<platform>`
/// settings rows.
pub async fn caps_for<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
) -> Result<Option<BudgetCaps>> {
    let daily_override = get_i32(db, &format!("rate_daily_limit_{platform}")).await?;
    let quarter_override = get_i32(db, &format!("rate_quarter_hour_limit_{platform}")).await?;

    let mut caps = default_caps(platform);
    if daily_override.is_some() || quarter_override.is_some() {
        let base = caps.unwrap_or(BudgetCaps {
            daily: i32::MAX,
            quarter_hour: i32::MAX,
        });
        caps = Some(BudgetCaps {
            daily: daily_override.unwrap_or(base.daily),
            quarter_hour: quarter_override.unwrap_or(base.quarter_hour),
        });
    }

    Ok(caps)
}

async fn get_i32<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<i32>> {
    Ok(catalog::settings::get(db, key)
        .await?
        .and_then(|v| v.parse().ok()))
}

/// Reserve `cost` API calls against a platform's budget.
///
/// Unmetered platforms are always granted. For metered platforms, expired
/// windows are first reset, then both counters are checked against their
/// caps; on success the counters are debited and persisted.
pub async fn reserve<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
    cost: i32,
) -> Result<Admission> {
    let Some(caps) = caps_for(db, platform).await? else {
        return Ok(Admission::Granted);
    };

    let now = Utc::now();
    let mut row = load_or_seed(db, platform, caps, now).await?;
    decay(&mut row, now);

    // Tunable changes apply on the next reservation.
    row.daily_limit = caps.daily;
    row.quarter_hour_limit = caps.quarter_hour;

    if row.daily_calls + cost > row.daily_limit {
        let retry_after = row.daily_reset_at.with_timezone(&Utc) - now;
        catalog::put_api(db, row).await?;
        return Ok(Admission::Denied {
            retry_after: retry_after.max(Duration::zero()),
        });
    }

    if row.quarter_hour_calls + cost > row.quarter_hour_limit {
        let retry_after = row.quarter_hour_reset_at.with_timezone(&Utc) - now;
        catalog::put_api(db, row).await?;
        return Ok(Admission::Denied {
            retry_after: retry_after.max(Duration::zero()),
        });
    }

    row.daily_calls += cost;
    row.quarter_hour_calls += cost;
    catalog::put_api(db, row).await?;

    Ok(Admission::Granted)
}

/// Remaining headroom for a metered platform, `None` for unmetered ones.
pub async fn headroom<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
) -> Result<Option<(i32, i32)>> {
    let Some(caps) = caps_for(db, platform).await? else {
        return Ok(None);
    };

    let now = Utc::now();
    let mut row = load_or_seed(db, platform, caps, now).await?;
    decay(&mut row, now);

    Ok(Some((
        (row.daily_limit - row.daily_calls).max(0),
        (row.quarter_hour_limit - row.quarter_hour_calls).max(0),
    )))
}

async fn load_or_seed<C: ConnectionTrait>(
    db: &C,
    platform: Platform,
    caps: BudgetCaps,
    now: DateTime<Utc>,
) -> Result<ApiLimitModel> {
    if let Some(row) = catalog::get_api(db, platform).await? {
        return Ok(row);
    }

    Ok(ApiLimitModel {
        platform,
        daily_calls: 0,
        quarter_hour_calls: 0,
        daily_limit: caps.daily,
        quarter_hour_limit: caps.quarter_hour,
        daily_reset_at: (now + daily_window()).fixed_offset(),
        quarter_hour_reset_at: (now + quarter_hour_window()).fixed_offset(),
    })
}

fn decay(row: &mut ApiLimitModel, now: DateTime<Utc>) {
    if now >= row.daily_reset_at.with_timezone(&Utc) {
        row.daily_calls = 0;
        row.daily_reset_at = (now + daily_window()).fixed_offset();
    }
    if now >= row.quarter_hour_reset_at.with_timezone(&Utc) {
        row.quarter_hour_calls = 0;
        row.quarter_hour_reset_at = (now + quarter_hour_window()).fixed_offset();
    }
}
