//! Hierarchical document store
//!
//! All persistent state lives in a remote key-path addressed store shaped like
//! Firebase Realtime Database. Handlers only ever see the [`Store`] trait so the
//! REST client can be swapped for [`MemoryStore`] in tests and local runs.
//!
//! Writes are plain read-then-write sequences. There is no compare-and-swap,
//! so two requests against the same path can interleave.

pub mod memory;
pub mod rtdb;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use rtdb::RtdbStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode store value: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid store path: {0}")]
    InvalidPath(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Point read. Absent paths yield `None`.
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Merge `fields` into the object at `path`. A `null` field deletes that child.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Append `value` under a generated, chronologically ordered key.
    async fn push(&self, path: &str, value: Value) -> StoreResult<String>;

    async fn remove(&self, path: &str) -> StoreResult<()>;

    /// Short backend name for health output.
    fn backend(&self) -> &'static str;
}

/// Placeholder the store replaces with its own clock (epoch-ms) on write.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp")
        }
        _ => false,
    }
}

/// Split a slash separated path into its segments, rejecting empty ones.
pub(crate) fn segments(path: &str) -> StoreResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Open the backend selected in configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Rtdb => {
            let Some(credential) = config.credential.as_deref() else {
                bail!("FIREBASE_DATABASE_SECRET is required for the rtdb backend");
            };
            if config.database_url.is_empty() {
                bail!("store.database_url (or FIREBASE_DATABASE_URL) is required for the rtdb backend");
            }
            let store = RtdbStore::new(
                &config.database_url,
                credential,
                Duration::from_secs(config.timeout_secs),
            )?;
            info!("Using Realtime Database at {}", config.database_url);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
