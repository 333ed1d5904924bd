//! TaskBazar Server
//!
//! HTTP routes for the points, campaign and referral endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::auth::{AuthUser, IdentityVerifier};
use crate::bazar::TaskBazar;
use crate::bonus::BonusOutcome;
use crate::campaign::{CreateCampaign, DeleteCampaign, ReviewProof};
use crate::error::ApiError;
use crate::referral::ReferralClaim;
use crate::wheel::SpinOutcome;

pub const LIVENESS_MESSAGE: &str = "TaskBazar Full Secure Backend is Running! 🚀";

pub struct AppState {
    pub bazar: Arc<TaskBazar>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(bazar: Arc<TaskBazar>, verifier: Arc<dyn IdentityVerifier>) -> Arc<Self> {
        Arc::new(Self {
            bazar,
            verifier,
            started_at: std::time::Instant::now(),
        })
    }
}

/// `{"success": true, ...body}`
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Success<T> {
    fn new(body: T) -> Json<Self> {
        Json(Self {
            success: true,
            body,
        })
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn done() -> ApiResult<Value> {
    Ok(Json(json!({ "success": true })))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|e| {
        debug!("Rejected request body: {}", e);
        ApiError::InvalidInput("Invalid data")
    })
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/spin", post(spin_handler))
        .route("/api/daily-bonus", post(daily_bonus_handler))
        .route("/api/create-campaign", post(create_campaign_handler))
        .route("/api/delete-campaign", post(delete_campaign_handler))
        .route("/api/review-proof", post(review_proof_handler))
        .route("/api/referral", post(referral_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    LIVENESS_MESSAGE
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "healthy": true,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.bazar.store_backend(),
    }))
}

async fn spin_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
) -> ApiResult<Success<SpinOutcome>> {
    let outcome = state.bazar.spin(&uid).await?;
    Ok(Success::new(outcome))
}

async fn daily_bonus_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
) -> ApiResult<Success<BonusOutcome>> {
    let outcome = state.bazar.claim_daily_bonus(&uid).await?;
    Ok(Success::new(outcome))
}

async fn create_campaign_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
    payload: Result<Json<CreateCampaign>, JsonRejection>,
) -> ApiResult<Value> {
    state.bazar.create_campaign(&uid, body(payload)?).await?;
    done()
}

async fn delete_campaign_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
    payload: Result<Json<DeleteCampaign>, JsonRejection>,
) -> ApiResult<Value> {
    state.bazar.delete_campaign(&uid, body(payload)?).await?;
    done()
}

async fn review_proof_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
    payload: Result<Json<ReviewProof>, JsonRejection>,
) -> ApiResult<Value> {
    state.bazar.review_proof(&uid, body(payload)?).await?;
    done()
}

async fn referral_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(uid): AuthUser,
    payload: Result<Json<ReferralClaim>, JsonRejection>,
) -> ApiResult<Value> {
    state.bazar.apply_referral(&uid, body(payload)?).await?;
    done()
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting TaskBazar server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
