//! Micro-task campaigns
//!
//! A creator funds a campaign up front with `totalCost` points, may delete it
//! later with a refund, and reviews worker submissions against it.
//!
//! `refundPoints`, `rewardPoints` and `newStatus` come straight from the
//! caller and are not checked against the stored campaign.
//!
//! A `taskId` that is absent, unusable as a key or unknown is treated like a
//! campaign owned by someone else.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::bazar::TaskBazar;
use crate::error::ApiError;
use crate::ledger::{credit, Microtask, StatsUpdate, TxKind};
use crate::paths::is_valid_key;
use crate::store::server_timestamp;

pub const MIN_CAMPAIGN_QTY: i64 = 10;

pub const APPROVED: &str = "approved";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaign {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub link: Option<String>,
    pub qty: Option<i64>,
    pub total_cost: Option<i64>,
    pub reward: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCampaign {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub refund_points: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewProof {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub sub_id: String,
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub reward_points: i64,
    pub new_status: String,
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn require_key(key: &str) -> Result<(), ApiError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput("Invalid data"))
    }
}

impl TaskBazar {
    async fn owns_task(&self, uid: &str, task_id: &str) -> Result<bool, ApiError> {
        if !is_valid_key(task_id) {
            return Ok(false);
        }
        Ok(self
            .ledger()
            .microtask(task_id)
            .await?
            .is_some_and(|task| task.is_owned_by(uid)))
    }

    /// Debit the creator and publish a new campaign. Returns the new task id.
    pub async fn create_campaign(
        &self,
        uid: &str,
        request: CreateCampaign,
    ) -> Result<String, ApiError> {
        let qty = request.qty.filter(|q| *q >= MIN_CAMPAIGN_QTY);
        let total_cost = request.total_cost.filter(|c| *c >= 0);
        let (Some(qty), Some(total_cost)) = (qty, total_cost) else {
            return Err(ApiError::InvalidInput("Invalid data"));
        };
        if !non_empty(&request.title) || !non_empty(&request.link) {
            return Err(ApiError::InvalidInput("Invalid data"));
        }

        let ledger = self.ledger();
        let points = ledger.stats(uid).await?.points;
        if points < total_cost {
            warn!(
                "Campaign rejected for {}: cost {} exceeds {} points",
                uid, total_cost, points
            );
            return Err(ApiError::InvalidInput("Not enough points"));
        }

        // The debit has no history entry.
        ledger.set_points(uid, points - total_cost).await?;

        let task_id = format!("t_{}", Utc::now().timestamp_millis());
        let task = Microtask {
            title: request.title.map(Value::from),
            kind: request.kind.map(Value::from),
            link: request.link.map(Value::from),
            qty: Some(Value::from(qty)),
            reward: request.reward.map(Value::from),
            creator_id: Some(uid.to_string()),
            timestamp: Some(server_timestamp()),
        };
        ledger.put_microtask(&task_id, &task).await?;

        info!("{} created campaign {} for {} points", uid, task_id, total_cost);
        Ok(task_id)
    }

    /// Remove a campaign owned by `uid` and credit back the requested refund.
    pub async fn delete_campaign(&self, uid: &str, request: DeleteCampaign) -> Result<(), ApiError> {
        if !self.owns_task(uid, &request.task_id).await? {
            warn!("{} may not delete campaign {:?}", uid, request.task_id);
            return Err(ApiError::Forbidden);
        }
        let ledger = self.ledger();

        let refunded = if request.refund_points > 0 {
            let points = ledger.stats(uid).await?.points;
            Some(credit(points, request.refund_points)?)
        } else {
            None
        };

        ledger.remove_microtask(&request.task_id).await?;

        if let Some(points) = refunded {
            ledger.set_points(uid, points).await?;
            ledger
                .record(
                    uid,
                    TxKind::Refund,
                    request.refund_points,
                    "Campaign Delete Refund",
                )
                .await?;
        }

        info!(
            "{} deleted campaign {} (refund {})",
            uid, request.task_id, request.refund_points
        );
        Ok(())
    }

    /// Record the creator's verdict on a submission and pay the worker if approved.
    pub async fn review_proof(&self, uid: &str, request: ReviewProof) -> Result<(), ApiError> {
        if !self.owns_task(uid, &request.task_id).await? {
            warn!("{} may not review campaign {:?}", uid, request.task_id);
            return Err(ApiError::Forbidden);
        }
        require_key(&request.sub_id)?;
        require_key(&request.worker_id)?;
        let ledger = self.ledger();

        let approved = request.new_status == APPROVED;
        let payout = if approved {
            let worker = ledger.stats(&request.worker_id).await?;
            Some(StatsUpdate {
                points: Some(credit(worker.points, request.reward_points)?),
                tasks_completed: Some(credit(worker.tasks_completed, 1)?),
                ..Default::default()
            })
        } else {
            None
        };

        ledger
            .review_submission(&request.task_id, &request.sub_id, &request.new_status)
            .await?;

        if let Some(update) = payout {
            ledger.merge_stats(&request.worker_id, update).await?;
            ledger
                .record(
                    &request.worker_id,
                    TxKind::Mission,
                    request.reward_points,
                    "Mission Approved",
                )
                .await?;
        }

        let (title, message) = if approved {
            (
                "Mission Approved! ✅".to_string(),
                format!("Your proof was approved, +{} points.", request.reward_points),
            )
        } else {
            (
                "Mission Rejected ❌".to_string(),
                "The creator rejected your proof.".to_string(),
            )
        };
        ledger.notify(&request.worker_id, title, message).await?;

        info!(
            "{} reviewed submission {}/{} as {:?}",
            uid, request.task_id, request.sub_id, request.new_status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn bazar(data: Value) -> TaskBazar {
        TaskBazar::new(Arc::new(MemoryStore::with_data(data)), "app")
    }

    fn seeded() -> TaskBazar {
        bazar(json!({ "artifacts": { "app": {
            "users": {
                "creator": { "stats": { "points": 100 } },
                "worker": { "stats": { "points": 4, "tasksCompleted": 2 } },
                "stranger": { "stats": { "points": 9 } }
            },
            "public": { "data": {
                "microtasks": { "t_1": {
                    "title": "Follow page", "type": "facebook", "link": "https://x",
                    "qty": 10, "reward": 5, "creatorId": "creator", "timestamp": 1
                } },
                "submissions": { "t_1": { "s1": { "status": "pending", "workerId": "worker" } } }
            } }
        } } }))
    }

    fn create_request(qty: i64, total_cost: i64) -> CreateCampaign {
        CreateCampaign {
            title: Some("Subscribe".to_string()),
            kind: Some("youtube".to_string()),
            link: Some("https://youtube.com/x".to_string()),
            qty: Some(qty),
            total_cost: Some(total_cost),
            reward: Some(3),
        }
    }

    fn review(status: &str) -> ReviewProof {
        ReviewProof {
            task_id: "t_1".to_string(),
            sub_id: "s1".to_string(),
            worker_id: "worker".to_string(),
            reward_points: 5,
            new_status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_below_min_qty_fails_regardless_of_balance() {
        let bazar = seeded();
        let err = bazar
            .create_campaign("creator", create_request(9, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput("Invalid data")));
        assert_eq!(bazar.ledger().stats("creator").await.unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_create_debits_exactly_total_cost() {
        let bazar = seeded();
        let task_id = bazar
            .create_campaign("creator", create_request(10, 30))
            .await
            .unwrap();

        let ledger = bazar.ledger();
        assert_eq!(ledger.stats("creator").await.unwrap().points, 70);
        // the debit leaves no history entry
        assert!(ledger.transactions("creator").await.unwrap().is_empty());

        let task = ledger.microtask(&task_id).await.unwrap().unwrap();
        assert!(task_id.starts_with("t_"));
        assert!(task.is_owned_by("creator"));
        assert_eq!(task.qty, Some(json!(10)));
        assert_eq!(task.reward, Some(json!(3)));
        assert_eq!(task.kind, Some(json!("youtube")));
        assert!(task.timestamp.unwrap().is_i64());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let bazar = seeded();

        let mut missing_title = create_request(10, 1);
        missing_title.title = None;
        assert!(bazar.create_campaign("creator", missing_title).await.is_err());

        let mut empty_link = create_request(10, 1);
        empty_link.link = Some(String::new());
        assert!(bazar.create_campaign("creator", empty_link).await.is_err());

        let mut no_qty = create_request(10, 1);
        no_qty.qty = None;
        assert!(bazar.create_campaign("creator", no_qty).await.is_err());

        let negative = create_request(10, -50);
        assert!(bazar.create_campaign("creator", negative).await.is_err());

        assert_eq!(bazar.ledger().stats("creator").await.unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_create_insufficient_balance() {
        let bazar = seeded();
        let err = bazar
            .create_campaign("stranger", create_request(10, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput("Not enough points")));
        assert_eq!(bazar.ledger().stats("stranger").await.unwrap().points, 9);
    }

    #[tokio::test]
    async fn test_delete_by_non_creator_is_forbidden() {
        let bazar = seeded();
        let err = bazar
            .delete_campaign(
                "stranger",
                DeleteCampaign {
                    task_id: "t_1".to_string(),
                    refund_points: 50,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        let ledger = bazar.ledger();
        assert!(ledger.microtask("t_1").await.unwrap().is_some());
        assert_eq!(ledger.stats("stranger").await.unwrap().points, 9);
        assert_eq!(ledger.stats("creator").await.unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_delete_missing_task_is_forbidden() {
        let bazar = seeded();
        let err = bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_404".to_string(),
                    refund_points: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn test_delete_refunds_caller_supplied_amount() {
        let bazar = seeded();
        bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_1".to_string(),
                    refund_points: 25,
                },
            )
            .await
            .unwrap();

        let ledger = bazar.ledger();
        assert!(ledger.microtask("t_1").await.unwrap().is_none());
        assert_eq!(ledger.stats("creator").await.unwrap().points, 125);

        let history = ledger.transactions("creator").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TxKind::Refund);
        assert_eq!(history[0].amount, 25);

        // submissions against the deleted task stay where they are
        let sub = ledger
            .store()
            .get(&ledger.paths().submission("t_1", "s1"))
            .await
            .unwrap();
        assert!(sub.is_some());
    }

    #[tokio::test]
    async fn test_delete_without_refund_writes_no_history() {
        let bazar = seeded();
        bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_1".to_string(),
                    refund_points: 0,
                },
            )
            .await
            .unwrap();
        let ledger = bazar.ledger();
        assert_eq!(ledger.stats("creator").await.unwrap().points, 100);
        assert!(ledger.transactions("creator").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_credits_worker() {
        let bazar = seeded();
        bazar.review_proof("creator", review("approved")).await.unwrap();

        let ledger = bazar.ledger();
        let worker = ledger.stats("worker").await.unwrap();
        assert_eq!(worker.points, 9);
        assert_eq!(worker.tasks_completed, 3);

        let history = ledger.transactions("worker").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TxKind::Mission);
        assert_eq!(history[0].amount, 5);

        let inbox = ledger.notifications("worker").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "Mission Approved! ✅");
        assert_eq!(inbox[0].message, "Your proof was approved, +5 points.");

        let sub = ledger
            .store()
            .get(&ledger.paths().submission("t_1", "s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub["status"], "approved");
        assert_eq!(sub["workerId"], "worker");
        assert!(sub["reviewedAt"].is_i64());
    }

    #[tokio::test]
    async fn test_other_statuses_only_notify() {
        for status in ["rejected", "pending", "Approved", "whatever"] {
            let bazar = seeded();
            bazar.review_proof("creator", review(status)).await.unwrap();

            let ledger = bazar.ledger();
            let worker = ledger.stats("worker").await.unwrap();
            assert_eq!(worker.points, 4);
            assert_eq!(worker.tasks_completed, 2);
            assert!(ledger.transactions("worker").await.unwrap().is_empty());

            let inbox = ledger.notifications("worker").await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].title, "Mission Rejected ❌");
            assert_eq!(inbox[0].message, "The creator rejected your proof.");

            let sub = ledger
                .store()
                .get(&ledger.paths().submission("t_1", "s1"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sub["status"], status);
        }
    }

    #[tokio::test]
    async fn test_review_by_non_creator_is_forbidden() {
        let bazar = seeded();
        let err = bazar
            .review_proof("stranger", review("approved"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        let ledger = bazar.ledger();
        assert_eq!(ledger.stats("worker").await.unwrap().points, 4);
        assert!(ledger.notifications("worker").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_rejects_path_like_ids() {
        let bazar = seeded();
        let mut request = review("approved");
        request.worker_id = "creator/stats".to_string();
        let err = bazar.review_proof("creator", request).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput("Invalid data")));
    }

    #[tokio::test]
    async fn test_unusable_task_ids_are_forbidden() {
        let bazar = seeded();
        for task_id in ["", "a.b", "t_1/../t_2", "t_404"] {
            let err = bazar
                .delete_campaign(
                    "creator",
                    DeleteCampaign {
                        task_id: task_id.to_string(),
                        refund_points: 10,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Forbidden), "{:?}", task_id);

            let mut request = review("approved");
            request.task_id = task_id.to_string();
            let err = bazar.review_proof("creator", request).await.unwrap_err();
            assert!(matches!(err, ApiError::Forbidden), "{:?}", task_id);
        }
        assert_eq!(bazar.ledger().stats("creator").await.unwrap().points, 100);
    }

    #[tokio::test]
    async fn test_loosely_typed_campaign_can_be_deleted_and_reviewed() {
        let bazar = bazar(json!({ "artifacts": { "app": {
            "users": { "creator": { "stats": { "points": 100 } } },
            "public": { "data": { "microtasks": {
                "t_1": { "qty": "10", "reward": "5 points", "creatorId": "creator" },
                "t_2": { "qty": 10.5, "reward": "5", "creatorId": "creator" }
            } } }
        } } }));

        bazar.review_proof("creator", review("rejected")).await.unwrap();
        bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_1".to_string(),
                    refund_points: 0,
                },
            )
            .await
            .unwrap();
        bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_2".to_string(),
                    refund_points: 0,
                },
            )
            .await
            .unwrap();

        let ledger = bazar.ledger();
        assert!(ledger.microtask("t_1").await.unwrap().is_none());
        assert!(ledger.microtask("t_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_reward_writes_nothing() {
        let bazar = seeded();
        let mut request = review("approved");
        request.reward_points = i64::MAX;
        let err = bazar.review_proof("creator", request).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput("Invalid data")));

        let ledger = bazar.ledger();
        let worker = ledger.stats("worker").await.unwrap();
        assert_eq!(worker.points, 4);
        assert_eq!(worker.tasks_completed, 2);
        assert!(ledger.transactions("worker").await.unwrap().is_empty());
        assert!(ledger.notifications("worker").await.unwrap().is_empty());
        let sub = ledger
            .store()
            .get(&ledger.paths().submission("t_1", "s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub["status"], "pending");
    }

    #[tokio::test]
    async fn test_oversized_refund_keeps_campaign() {
        let bazar = seeded();
        let err = bazar
            .delete_campaign(
                "creator",
                DeleteCampaign {
                    task_id: "t_1".to_string(),
                    refund_points: i64::MAX,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput("Invalid data")));

        let ledger = bazar.ledger();
        assert!(ledger.microtask("t_1").await.unwrap().is_some());
        assert_eq!(ledger.stats("creator").await.unwrap().points, 100);
        assert!(ledger.transactions("creator").await.unwrap().is_empty());
    }
}
