//! TaskBazar API client
//!
//! Thin wrapper over the server's JSON routes. Every `/api` call carries the
//! caller's ID token as a bearer header.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub prize_index: usize,
    pub win_amount: i64,
    pub new_points: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusResponse {
    pub new_points: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub link: String,
    pub qty: i64,
    pub total_cost: i64,
    pub reward: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub task_id: String,
    pub sub_id: String,
    pub worker_id: String,
    pub reward_points: i64,
    pub new_status: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub uptime_secs: u64,
    pub version: String,
    pub store: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct TaskBazarClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TaskBazarClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        // Build HTTP client with timeout, falling back to default client if builder fails
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow!("No ID token. Pass --token or set TASKBAZAR_TOKEN."))?;

        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .context("Failed to connect to server")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => bail!("{} ({})", body.error, status.as_u16()),
            Err(_) => bail!("Request failed ({}): {}", status, text),
        }
    }

    pub async fn spin(&self) -> Result<SpinResponse> {
        self.post("api/spin", &json!({})).await
    }

    pub async fn daily_bonus(&self) -> Result<BonusResponse> {
        self.post("api/daily-bonus", &json!({})).await
    }

    pub async fn create_campaign(&self, campaign: &NewCampaign) -> Result<()> {
        let _: Value = self.post("api/create-campaign", campaign).await?;
        Ok(())
    }

    pub async fn delete_campaign(&self, task_id: &str, refund_points: i64) -> Result<()> {
        let _: Value = self
            .post(
                "api/delete-campaign",
                &json!({ "taskId": task_id, "refundPoints": refund_points }),
            )
            .await?;
        Ok(())
    }

    pub async fn review_proof(&self, review: &Review) -> Result<()> {
        let _: Value = self.post("api/review-proof", review).await?;
        Ok(())
    }

    pub async fn referral(&self, code: &str, new_user_name: &str) -> Result<()> {
        let _: Value = self
            .post(
                "api/referral",
                &json!({ "referCode": code, "newUserName": new_user_name }),
            )
            .await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .context("Failed to connect to server")?;
        Ok(resp.error_for_status()?.json().await?)
    }
}
