//! Authentication
//!
//! - Bearer token extraction from the `Authorization` header
//! - ID token verification against the Identity Toolkit `accounts:lookup` API
//! - Static token table for local development and tests
//! - [`AuthUser`] extractor that gates every `/api` route

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, StoreBackend};
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity service rejected the token ({0})")]
    Rejected(u16),

    #[error("token does not belong to any user")]
    UnknownUser,
}

/// Resolves an ID token to the caller's uid.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Token from an `Authorization: Bearer <token>` header, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

/// Verifies Firebase ID tokens by looking them up with the project's Web API key.
pub struct IdentityToolkitVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
}

impl IdentityToolkitVerifier {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskbazar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for IdentityToolkitVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let url = format!("{}/v1/accounts:lookup", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()));
        }

        let lookup: LookupResponse = response.json().await?;
        lookup
            .users
            .into_iter()
            .next()
            .map(|user| user.local_id)
            .filter(|uid| !uid.is_empty())
            .ok_or(AuthError::UnknownUser)
    }
}

/// Fixed token to uid table.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, String>,
}

impl StaticVerifier {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Parse `token=uid,token=uid`.
    pub fn from_pairs(pairs: &str) -> Result<Self> {
        let mut tokens = HashMap::new();
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((token, uid)) if !token.is_empty() && !uid.is_empty() => {
                    tokens.insert(token.to_string(), uid.to_string());
                }
                _ => bail!("Invalid dev token entry: {}", pair),
            }
        }
        Ok(Self { tokens })
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::UnknownUser)
    }
}

/// Build the verifier matching the configured store backend.
pub fn verifier_from_config(config: &Config) -> Result<Arc<dyn IdentityVerifier>> {
    match config.store.backend {
        StoreBackend::Rtdb => {
            let Some(api_key) = config.identity.api_key.as_deref() else {
                bail!("FIREBASE_API_KEY is required to verify ID tokens");
            };
            info!("Verifying ID tokens via {}", config.identity.base_url);
            Ok(Arc::new(IdentityToolkitVerifier::new(
                &config.identity.base_url,
                api_key,
                Duration::from_secs(config.identity.timeout_secs),
            )?))
        }
        StoreBackend::Memory => {
            let verifier =
                StaticVerifier::from_pairs(config.identity.dev_tokens.as_deref().unwrap_or(""))?;
            if verifier.tokens.is_empty() {
                warn!("No TASKBAZAR_DEV_TOKENS configured; every protected route will return 401");
            }
            Ok(Arc::new(verifier))
        }
    }
}

/// The verified caller of a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized("Unauthorized"))?;

        match state.verifier.verify(token).await {
            Ok(uid) => Ok(AuthUser(uid)),
            Err(e) => {
                debug!("Token verification failed: {}", e);
                Err(ApiError::Unauthorized("Invalid Token"))
            }
        }
    }
}
