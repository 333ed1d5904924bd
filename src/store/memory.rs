//! In-process store with Realtime Database semantics
//!
//! Values live in one `serde_json::Value` tree. Like the real database, empty
//! objects and `null` do not exist: writing either removes the node, and
//! removing the last child of an object removes the object too.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{is_server_timestamp, segments, Store, StoreResult};

pub struct MemoryStore {
    root: Mutex<Value>,
    last_push: Mutex<(i64, u32)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            last_push: Mutex::new((0, 0)),
        }
    }

    /// Store seeded with an initial tree, mainly for tests.
    pub fn with_data(data: Value) -> Self {
        let store = Self::new();
        store.write(&[], data);
        store
    }

    /// Full copy of the current tree.
    pub fn snapshot(&self) -> Value {
        self.root.lock().clone()
    }

    /// Keys sort in creation order: fixed width hex millis, then a per-millisecond sequence.
    fn next_push_key(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_push.lock();
        if now > last.0 {
            *last = (now, 0);
        } else {
            last.1 += 1;
        }
        format!("-{:012x}{:06x}", last.0, last.1)
    }

    fn write(&self, parts: &[&str], value: Value) {
        let value = normalize(resolve_timestamps(value, Utc::now().timestamp_millis()));
        let mut root = self.root.lock();
        if parts.is_empty() {
            *root = match value {
                Value::Null => Value::Object(Map::new()),
                other => other,
            };
            return;
        }
        if value.is_null() {
            remove_at(&mut root, parts);
        } else {
            insert_at(&mut root, parts, value);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let parts = segments(path)?;
        let root = self.root.lock();
        let mut node = &*root;
        for part in parts {
            match node.get(part) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(match node {
            Value::Object(map) if map.is_empty() => None,
            other => Some(other.clone()),
        })
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let parts = segments(path)?;
        for (key, value) in fields {
            let child = segments(&key)?;
            let mut full = parts.clone();
            full.extend(child);
            self.write(&full, value);
        }
        Ok(())
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let parts = segments(path)?;
        self.write(&parts, value);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> StoreResult<String> {
        let key = self.next_push_key();
        let mut parts = segments(path)?;
        parts.push(&key);
        self.write(&parts, value);
        Ok(key)
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        let parts = segments(path)?;
        self.write(&parts, Value::Null);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn resolve_timestamps(value: Value, now: i64) -> Value {
    if is_server_timestamp(&value) {
        return Value::from(now);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_timestamps(v, now)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| resolve_timestamps(v, now))
                .collect(),
        ),
        other => other,
    }
}

/// Drop null members and empty objects, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn insert_at(node: &mut Value, parts: &[&str], value: Value) {
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => {
            *node = value;
            return;
        }
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_at(child, rest, value);
    }
}

/// Returns true when `node` became empty and should be pruned by its parent.
fn remove_at(node: &mut Value, parts: &[&str]) -> bool {
    let Value::Object(map) = node else {
        return false;
    };
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    if rest.is_empty() {
        map.remove(*first);
    } else if let Some(child) = map.get_mut(*first) {
        if remove_at(child, rest) {
            map.remove(*first);
        }
    }
    map.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store
            .set("artifacts/app/users/u1/stats", json!({ "points": 20 }))
            .await
            .unwrap();

        let stats = store.get("artifacts/app/users/u1/stats").await.unwrap();
        assert_eq!(stats, Some(json!({ "points": 20 })));
        assert_eq!(
            store.get("artifacts/app/users/u1/stats/points").await.unwrap(),
            Some(json!(20))
        );
        assert_eq!(store.get("artifacts/app/users/u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::with_data(json!({
            "u": { "stats": { "points": 5, "referralCode": "ABC" } }
        }));

        let mut fields = Map::new();
        fields.insert("points".to_string(), json!(15));
        fields.insert("lastBonusDate".to_string(), json!(1000));
        store.update("u/stats", fields).await.unwrap();

        assert_eq!(
            store.get("u/stats").await.unwrap(),
            Some(json!({ "points": 15, "referralCode": "ABC", "lastBonusDate": 1000 }))
        );
    }

    #[tokio::test]
    async fn test_update_null_removes_field() {
        let store = MemoryStore::with_data(json!({ "u": { "a": 1, "b": 2 } }));
        let mut fields = Map::new();
        fields.insert("a".to_string(), Value::Null);
        store.update("u", fields).await.unwrap();
        assert_eq!(store.get("u").await.unwrap(), Some(json!({ "b": 2 })));
    }

    #[tokio::test]
    async fn test_push_keys_are_ordered() {
        let store = MemoryStore::new();
        let mut keys = Vec::new();
        for i in 0..50 {
            keys.push(store.push("log", json!({ "n": i })).await.unwrap());
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let log = store.get("log").await.unwrap().unwrap();
        let values: Vec<i64> = log
            .as_object()
            .unwrap()
            .values()
            .map(|v| v["n"].as_i64().unwrap())
            .collect();
        assert_eq!(values, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_server_timestamp_is_resolved() {
        let store = MemoryStore::new();
        let before = Utc::now().timestamp_millis();
        store
            .set("t", json!({ "title": "x", "timestamp": server_timestamp() }))
            .await
            .unwrap();
        let ts = store.get("t/timestamp").await.unwrap().unwrap();
        assert!(ts.as_i64().unwrap() >= before);
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let store = MemoryStore::with_data(json!({
            "public": { "data": { "microtasks": { "t_1": { "title": "a" } } } },
            "users": { "u": { "stats": { "points": 1 } } }
        }));
        store.remove("public/data/microtasks/t_1").await.unwrap();

        assert_eq!(store.get("public").await.unwrap(), None);
        assert_eq!(
            store.snapshot(),
            json!({ "users": { "u": { "stats": { "points": 1 } } } })
        );
    }

    #[tokio::test]
    async fn test_empty_object_is_absent() {
        let store = MemoryStore::new();
        store.set("a/b", json!({})).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), None);
        assert_eq!(store.get("a").await.unwrap(), None);
    }
}
