//! Daily bonus
//!
//! "Today" is the server's local midnight in epoch-ms. A claim is refused when
//! the stored `lastBonusDate` equals that value exactly, so the server clock
//! and timezone alone decide where a day starts.

use chrono::{Duration, Local, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

use crate::bazar::TaskBazar;
use crate::error::ApiError;
use crate::ledger::{credit, StatsUpdate, TxKind};

pub const DAILY_BONUS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusOutcome {
    pub new_points: i64,
    pub message: &'static str,
}

/// Epoch-ms of the most recent local midnight.
pub fn local_midnight_millis() -> i64 {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| {
            Local
                .from_local_datetime(&naive)
                .earliest()
                // midnight skipped by a DST jump: the day starts an hour later
                .or_else(|| {
                    Local
                        .from_local_datetime(&(naive + Duration::hours(1)))
                        .earliest()
                })
        })
        .map(|midnight| midnight.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

impl TaskBazar {
    pub async fn claim_daily_bonus(&self, uid: &str) -> Result<BonusOutcome, ApiError> {
        self.claim_daily_bonus_at(uid, local_midnight_millis()).await
    }

    /// Claim against an explicit day boundary (epoch-ms of that day's midnight).
    pub async fn claim_daily_bonus_at(
        &self,
        uid: &str,
        today_midnight: i64,
    ) -> Result<BonusOutcome, ApiError> {
        let ledger = self.ledger();
        let stats = ledger.stats(uid).await?;

        if stats.last_bonus_date == Some(today_midnight) {
            warn!("Daily bonus already claimed by {}", uid);
            return Err(ApiError::InvalidInput("Already claimed today!"));
        }

        let new_points = credit(stats.points, DAILY_BONUS)?;
        ledger
            .merge_stats(
                uid,
                StatsUpdate {
                    points: Some(new_points),
                    last_bonus_date: Some(today_midnight),
                    ..Default::default()
                },
            )
            .await?;
        ledger
            .record(uid, TxKind::Bonus, DAILY_BONUS, "Daily Gift Claimed")
            .await?;

        info!("{} claimed the daily bonus", uid);
        Ok(BonusOutcome {
            new_points,
            message: "Claimed 10 points!",
        })
    }
}
