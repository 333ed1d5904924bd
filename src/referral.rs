//! Referral bonus
//!
//! A user can be linked to one referrer, ever. The referrer is found by
//! scanning every user's stats for the code, first match in key order wins.

use serde::Deserialize;
use tracing::{info, warn};

use crate::bazar::TaskBazar;
use crate::error::ApiError;
use crate::ledger::{credit, StatsUpdate, TxKind};

pub const REFERRAL_BONUS: i64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClaim {
    pub refer_code: Option<String>,
    pub new_user_name: Option<String>,
}

impl TaskBazar {
    /// Link `uid` to the owner of `referCode` and pay that owner the bonus.
    pub async fn apply_referral(&self, uid: &str, claim: ReferralClaim) -> Result<(), ApiError> {
        let Some(code) = claim.refer_code.filter(|c| !c.is_empty()) else {
            return Err(ApiError::InvalidInput("No code"));
        };
        let new_user_name = claim.new_user_name.unwrap_or_default();

        let ledger = self.ledger();
        if ledger.stats(uid).await?.is_referred() {
            warn!("{} tried to apply a second referral", uid);
            return Err(ApiError::InvalidInput("Already referred"));
        }

        let Some((referrer, stats)) = ledger.find_by_referral_code(&code, uid).await? else {
            warn!("{} supplied an unknown referral code", uid);
            return Err(ApiError::InvalidInput("Invalid code"));
        };

        let points = credit(stats.points, REFERRAL_BONUS)?;
        ledger.set_points(&referrer, points).await?;
        ledger
            .record(
                &referrer,
                TxKind::Referral,
                REFERRAL_BONUS,
                format!("Referral Bonus ({})", new_user_name),
            )
            .await?;
        ledger
            .notify(
                &referrer,
                "রেফারেল বোনাস! 🎁",
                format!(
                    "আপনার রেফার কোড ব্যবহার করে {} জয়েন করেছে। +50 পয়েন্ট!",
                    new_user_name
                ),
            )
            .await?;
        ledger
            .merge_stats(
                uid,
                StatsUpdate {
                    referred_by: Some(referrer.clone()),
                    ..Default::default()
                },
            )
            .await?;

        info!("{} was referred by {}", uid, referrer);
        Ok(())
    }
}
