//! Spin-wheel
//!
//! A spin costs [`SPIN_COST`] points and pays out one slot of [`PRIZES`],
//! drawn uniformly. The table holds `0` and `5` twice each, which is how the
//! wheel weights those outcomes.

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::bazar::TaskBazar;
use crate::error::ApiError;
use crate::ledger::{credit, TxKind};

pub const SPIN_COST: i64 = 5;

/// Wheel slots in display order; `prizeIndex` in responses indexes this table.
pub const PRIZES: [i64; 8] = [0, 2, 5, 10, 20, 0, 50, 5];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    pub prize_index: usize,
    pub win_amount: i64,
    pub new_points: i64,
}

pub fn draw_prize_index() -> usize {
    rand::thread_rng().gen_range(0..PRIZES.len())
}

impl TaskBazar {
    pub async fn spin(&self, uid: &str) -> Result<SpinOutcome, ApiError> {
        let prize_index = draw_prize_index();
        self.spin_with_index(uid, prize_index).await
    }

    /// Spin with a predetermined slot.
    pub async fn spin_with_index(
        &self,
        uid: &str,
        prize_index: usize,
    ) -> Result<SpinOutcome, ApiError> {
        let win_amount = *PRIZES
            .get(prize_index)
            .ok_or(ApiError::InvalidInput("Invalid prize slot"))?;

        let ledger = self.ledger();
        let points = ledger.stats(uid).await?.points;
        if points < SPIN_COST {
            warn!("Spin rejected for {}: {} points", uid, points);
            return Err(ApiError::InvalidInput("Not enough points"));
        }

        let new_points = credit(points - SPIN_COST, win_amount)?;
        ledger.set_points(uid, new_points).await?;
        ledger
            .record(
                uid,
                TxKind::Spin,
                win_amount - SPIN_COST,
                format!("Spun the wheel (Won {})", win_amount),
            )
            .await?;

        info!("{} spun slot {} and won {}", uid, prize_index, win_amount);
        Ok(SpinOutcome {
            prize_index,
            win_amount,
            new_points,
        })
    }
}
