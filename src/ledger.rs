//! Points ledger
//!
//! Typed access to the per-user records: the `stats` node holding the points
//! balance, the append-only transaction history and the notification inbox.
//! Campaign and submission records are reached through here as well so that
//! handlers never build paths themselves.
//!
//! Balance changes all go through [`Ledger::merge_stats`]. It is a plain merge
//! write issued after the caller's read, so concurrent requests for the same
//! user may overwrite each other. New balances are computed with [`credit`].
//!
//! Stored records are read leniently: counters written as floats or numeric
//! strings are accepted, and campaign fields other than `creatorId` are kept
//! as raw JSON.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::paths::Paths;
use crate::store::{server_timestamp, Store, StoreError, StoreResult};

/// `balance + amount`, refused when the result does not fit in an `i64`.
pub fn credit(balance: i64, amount: i64) -> Result<i64, ApiError> {
    balance.checked_add(amount).ok_or_else(|| {
        warn!("Balance {} cannot absorb {}", balance, amount);
        ApiError::InvalidInput("Invalid data")
    })
}

/// Integer view of a stored number. Floats truncate toward zero and saturate.
fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_count).unwrap_or(0))
}

fn lenient_opt_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_count))
}

/// Strings pass through; any other non-null scalar is kept in its JSON form.
fn lenient_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Only a JSON string counts; a numeric `creatorId` owns nothing.
fn string_only<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// The `users/{uid}/stats` record. Missing counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default, deserialize_with = "lenient_count")]
    pub points: i64,
    #[serde(
        default,
        deserialize_with = "lenient_opt_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_bonus_date: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub referral_code: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub referred_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub tasks_completed: i64,
}

impl UserStats {
    pub fn is_referred(&self) -> bool {
        self.referred_by.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// Partial write to a stats node; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_bonus_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_completed: Option<i64>,
}

impl StatsUpdate {
    pub fn points(points: i64) -> Self {
        Self {
            points: Some(points),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Spin,
    Bonus,
    Mission,
    Referral,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: i64,
    pub desc: String,
    pub timestamp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub timestamp: Value,
}

/// A campaign as stored under `public/data/microtasks`. Only `creatorId` is
/// relied upon when reading; the rest is whatever the creator supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microtask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Value>,
    #[serde(default, deserialize_with = "string_only")]
    pub creator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl Microtask {
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.creator_id.as_deref() == Some(uid)
    }
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    paths: Paths,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, app_id: &str) -> Self {
        Self {
            store,
            paths: Paths::new(app_id),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub async fn stats(&self, uid: &str) -> StoreResult<UserStats> {
        match self.store.get(&self.paths.user_stats(uid)).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(UserStats::default()),
        }
    }

    pub async fn merge_stats(&self, uid: &str, update: StatsUpdate) -> StoreResult<()> {
        let fields = to_fields(&update)?;
        self.store.update(&self.paths.user_stats(uid), fields).await
    }

    pub async fn set_points(&self, uid: &str, points: i64) -> StoreResult<()> {
        self.merge_stats(uid, StatsUpdate::points(points)).await
    }

    /// Append a history entry stamped with the store's clock.
    pub async fn record(
        &self,
        uid: &str,
        kind: TxKind,
        amount: i64,
        desc: impl Into<String>,
    ) -> StoreResult<String> {
        let tx = Transaction {
            kind,
            amount,
            desc: desc.into(),
            timestamp: server_timestamp(),
        };
        self.store
            .push(&self.paths.transactions(uid), serde_json::to_value(tx)?)
            .await
    }

    pub async fn notify(
        &self,
        uid: &str,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> StoreResult<String> {
        let notification = Notification {
            title: title.into(),
            message: message.into(),
            timestamp: server_timestamp(),
        };
        self.store
            .push(
                &self.paths.notifications(uid),
                serde_json::to_value(notification)?,
            )
            .await
    }

    pub async fn transactions(&self, uid: &str) -> StoreResult<Vec<Transaction>> {
        self.children(&self.paths.transactions(uid)).await
    }

    pub async fn notifications(&self, uid: &str) -> StoreResult<Vec<Notification>> {
        self.children(&self.paths.notifications(uid)).await
    }

    /// First user (in store key order) other than `exclude_uid` whose stats carry `code`.
    ///
    /// This reads the whole `users` subtree, so it costs O(users) per call.
    pub async fn find_by_referral_code(
        &self,
        code: &str,
        exclude_uid: &str,
    ) -> StoreResult<Option<(String, UserStats)>> {
        let Some(Value::Object(users)) = self.store.get(&self.paths.users()).await? else {
            return Ok(None);
        };
        debug!("Scanning {} users for referral code", users.len());

        for (uid, user) in users {
            if uid == exclude_uid {
                continue;
            }
            let Some(stats) = user.get("stats") else {
                continue;
            };
            if stats.get("referralCode").and_then(Value::as_str) != Some(code) {
                continue;
            }
            let stats: UserStats = serde_json::from_value(stats.clone())?;
            return Ok(Some((uid, stats)));
        }
        Ok(None)
    }

    pub async fn microtask(&self, task_id: &str) -> StoreResult<Option<Microtask>> {
        match self.store.get(&self.paths.microtask(task_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn put_microtask(&self, task_id: &str, task: &Microtask) -> StoreResult<()> {
        self.store
            .set(&self.paths.microtask(task_id), serde_json::to_value(task)?)
            .await
    }

    pub async fn remove_microtask(&self, task_id: &str) -> StoreResult<()> {
        self.store.remove(&self.paths.microtask(task_id)).await
    }

    /// Stamp a submission with a review outcome.
    pub async fn review_submission(
        &self,
        task_id: &str,
        sub_id: &str,
        status: &str,
    ) -> StoreResult<()> {
        let mut fields = Map::new();
        fields.insert("status".to_string(), Value::from(status));
        fields.insert("reviewedAt".to_string(), server_timestamp());
        self.store
            .update(&self.paths.submission(task_id, sub_id), fields)
            .await
    }

    async fn children<T: serde::de::DeserializeOwned>(&self, path: &str) -> StoreResult<Vec<T>> {
        match self.store.get(path).await? {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(_, v)| serde_json::from_value(v).map_err(StoreError::from))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }
}

fn to_fields<T: Serialize>(value: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidPath(format!(
            "expected an object of fields, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn ledger(data: Value) -> Ledger {
        Ledger::new(Arc::new(MemoryStore::with_data(data)), "app")
    }

    #[tokio::test]
    async fn test_missing_stats_default_to_zero() {
        let ledger = ledger(json!({}));
        let stats = ledger.stats("nobody").await.unwrap();
        assert_eq!(stats, UserStats::default());
        assert_eq!(stats.points, 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let ledger = ledger(json!({
            "artifacts": { "app": { "users": { "u": { "stats": {
                "points": 3, "referralCode": "R1"
            } } } } }
        }));

        ledger.set_points("u", 42).await.unwrap();
        let stats = ledger.stats("u").await.unwrap();
        assert_eq!(stats.points, 42);
        assert_eq!(stats.referral_code.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_record_and_read_history() {
        let ledger = ledger(json!({}));
        ledger.record("u", TxKind::Spin, -5, "first").await.unwrap();
        ledger.record("u", TxKind::Bonus, 10, "second").await.unwrap();

        let history = ledger.transactions("u").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TxKind::Spin);
        assert_eq!(history[0].desc, "first");
        assert_eq!(history[1].amount, 10);
        assert!(history[1].timestamp.is_i64());
    }

    #[test]
    fn test_transaction_wire_shape() {
        let tx = Transaction {
            kind: TxKind::Refund,
            amount: 30,
            desc: "Campaign Delete Refund".to_string(),
            timestamp: server_timestamp(),
        };
        assert_eq!(
            serde_json::to_value(tx).unwrap(),
            json!({
                "type": "refund",
                "amount": 30,
                "desc": "Campaign Delete Refund",
                "timestamp": { ".sv": "timestamp" }
            })
        );
    }

    #[tokio::test]
    async fn test_find_by_referral_code() {
        let ledger = ledger(json!({
            "artifacts": { "app": { "users": {
                "alice": { "stats": { "points": 1, "referralCode": "SHARED" } },
                "bob": { "stats": { "points": 2, "referralCode": "SHARED" } },
                "carol": { "transactions": { "-x": { "amount": 1 } } }
            } } }
        }));

        let (uid, stats) = ledger
            .find_by_referral_code("SHARED", "zed")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uid, "alice");
        assert_eq!(stats.points, 1);

        // the caller is skipped even if they own the code
        let (uid, _) = ledger
            .find_by_referral_code("SHARED", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uid, "bob");

        assert!(ledger
            .find_by_referral_code("NOPE", "zed")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stats_update_only_serializes_set_fields() {
        let update = StatsUpdate {
            points: Some(7),
            tasks_completed: Some(2),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({ "points": 7, "tasksCompleted": 2 })
        );
    }

    #[test]
    fn test_credit_refuses_overflow() {
        assert_eq!(credit(4, 5).unwrap(), 9);
        assert_eq!(credit(4, -9).unwrap(), -5);
        assert!(matches!(
            credit(4, i64::MAX),
            Err(ApiError::InvalidInput("Invalid data"))
        ));
        assert!(credit(i64::MIN, -1).is_err());
    }

    #[tokio::test]
    async fn test_stats_tolerate_loose_numbers() {
        let ledger = ledger(json!({
            "artifacts": { "app": { "users": {
                "float": { "stats": { "points": 12.75, "tasksCompleted": 2.0 } },
                "text": { "stats": { "points": "30", "lastBonusDate": "1700000000000" } },
                "junk": { "stats": { "points": [1], "referredBy": 7 } }
            } } }
        }));

        let stats = ledger.stats("float").await.unwrap();
        assert_eq!(stats.points, 12);
        assert_eq!(stats.tasks_completed, 2);

        let stats = ledger.stats("text").await.unwrap();
        assert_eq!(stats.points, 30);
        assert_eq!(stats.last_bonus_date, Some(1_700_000_000_000));

        let stats = ledger.stats("junk").await.unwrap();
        assert_eq!(stats.points, 0);
        assert!(stats.is_referred());
    }

    #[tokio::test]
    async fn test_microtask_fields_are_untyped() {
        let ledger = ledger(json!({
            "artifacts": { "app": { "public": { "data": { "microtasks": {
                "t_1": { "qty": "10", "reward": "5 points", "title": 3, "creatorId": "creator" },
                "t_2": { "qty": 10, "creatorId": 42 }
            } } } } }
        }));

        let task = ledger.microtask("t_1").await.unwrap().unwrap();
        assert!(task.is_owned_by("creator"));
        assert_eq!(task.reward, Some(json!("5 points")));

        let task = ledger.microtask("t_2").await.unwrap().unwrap();
        assert!(!task.is_owned_by("42"));
    }
}
