//! Bridge HTTP routes — the endpoints worker sessions talk to.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::upstream::{JobRouter, deregistration_patch, registration_patch};
use crate::config::WorkerProfile;
use crate::error::GatewayError;
use crate::routing::AcceptOfferRequest;

const DEFAULT_DISPLAY_NAME: &str = "Agent";

/// Shared handler state. Built once per process.
#[derive(Clone)]
pub struct BridgeState {
    pub router: Arc<dyn JobRouter>,
    pub profile: Arc<WorkerProfile>,
}

/// Build the bridge router.
pub fn bridge_routes(router: Arc<dyn JobRouter>, profile: WorkerProfile) -> Router {
    let state = BridgeState {
        router,
        profile: Arc::new(profile),
    };

    Router::new()
        .route("/health", get(health))
        .route("/registerWorker/{worker_id}", get(register_worker))
        .route("/deregisterWorker/{worker_id}", get(deregister_worker))
        .route("/getJobAssignment/{worker_id}", get(get_job_assignment))
        .route("/getJobDetail/{job_id}", get(get_job_detail))
        .route("/acceptJobOffer", post(accept_job_offer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Upstream failure, answered with the status matching its kind.
#[derive(Debug)]
pub struct BridgeError(GatewayError);

impl From<GatewayError> for BridgeError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

type BridgeResult = Result<Json<Value>, BridgeError>;

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-desk-bridge"
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterQuery {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

async fn register_worker(
    State(state): State<BridgeState>,
    Path(worker_id): Path<String>,
    Query(query): Query<RegisterQuery>,
) -> BridgeResult {
    let display_name = query
        .display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    let patch = registration_patch(&state.profile, &display_name);
    let worker = state
        .router
        .patch_worker(&worker_id, &patch)
        .await
        .inspect_err(|e| warn!(worker_id = %worker_id, error = %e, "registerWorker failed"))?;

    info!(worker_id = %worker_id, display_name = %display_name, "Worker registered upstream");
    Ok(Json(worker))
}

async fn deregister_worker(
    State(state): State<BridgeState>,
    Path(worker_id): Path<String>,
) -> BridgeResult {
    let worker = state
        .router
        .patch_worker(&worker_id, &deregistration_patch())
        .await
        .inspect_err(|e| warn!(worker_id = %worker_id, error = %e, "deregisterWorker failed"))?;

    info!(worker_id = %worker_id, "Worker deregistered upstream");
    Ok(Json(worker))
}

async fn get_job_assignment(
    State(state): State<BridgeState>,
    Path(worker_id): Path<String>,
) -> BridgeResult {
    let worker = state.router.get_worker(&worker_id).await?;
    Ok(Json(worker))
}

async fn get_job_detail(
    State(state): State<BridgeState>,
    Path(job_id): Path<String>,
) -> BridgeResult {
    let job = state
        .router
        .get_job(&job_id)
        .await
        .inspect_err(|e| warn!(job_id = %job_id, error = %e, "getJobDetail failed"))?;
    Ok(Json(job))
}

async fn accept_job_offer(
    State(state): State<BridgeState>,
    Json(req): Json<AcceptOfferRequest>,
) -> Result<(StatusCode, Json<Value>), BridgeError> {
    let accepted = state
        .router
        .accept_offer(&req.worker_id, &req.offer_id)
        .await
        .inspect_err(|e| {
            warn!(worker_id = %req.worker_id, offer_id = %req.offer_id, error = %e, "acceptJobOffer failed")
        })?;

    info!(worker_id = %req.worker_id, offer_id = %req.offer_id, "Job offer accepted upstream");
    Ok((StatusCode::OK, Json(accepted)))
}
