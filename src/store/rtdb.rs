//! Firebase Realtime Database REST client
//!
//! Every operation is a single request against `{database_url}/{path}.json`:
//! GET reads, PATCH merges, PUT replaces, POST appends and DELETE removes.
//! The credential travels in the `auth` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{segments, Store, StoreError, StoreResult};

pub struct RtdbStore {
    client: reqwest::Client,
    base_url: String,
    credential: String,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl RtdbStore {
    pub fn new(
        database_url: &str,
        credential: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskbazar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: database_url.trim_end_matches('/').to_string(),
            credential: credential.into(),
        })
    }

    fn url(&self, path: &str) -> StoreResult<String> {
        let encoded: Vec<String> = segments(path)?
            .into_iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        Ok(format!("{}/{}.json", self.base_url, encoded.join("/")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        let response = request
            .query(&[("auth", self.credential.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Store for RtdbStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let url = self.url(path)?;
        debug!("GET {}", path);
        let response = self.send(self.client.get(&url)).await?;
        let value: Value = response.json().await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let url = self.url(path)?;
        debug!("PATCH {}", path);
        self.send(self.client.patch(&url).json(&fields)).await?;
        Ok(())
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let url = self.url(path)?;
        debug!("PUT {}", path);
        self.send(self.client.put(&url).json(&value)).await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> StoreResult<String> {
        let url = self.url(path)?;
        debug!("POST {}", path);
        let response = self.send(self.client.post(&url).json(&value)).await?;
        let pushed: PushResponse = response.json().await?;
        Ok(pushed.name)
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        let url = self.url(path)?;
        debug!("DELETE {}", path);
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "rtdb"
    }
}
