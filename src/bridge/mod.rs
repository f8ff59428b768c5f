//! Routing bridge — the HTTP service between worker sessions and the job router.
//!
//! - `upstream` — reqwest client for the job-router REST API
//! - `routes` — axum endpoints consumed by `HttpRoutingGateway`

pub mod routes;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::BridgeConfig;
use crate::error::Result;

pub use routes::{BridgeError, BridgeState, bridge_routes};
pub use upstream::{JobRouter, JobRouterClient, deregistration_patch, registration_patch};

/// Build the upstream client once and serve the bridge until the listener fails.
pub async fn serve(config: BridgeConfig) -> Result<()> {
    let router: Arc<dyn JobRouter> = Arc::new(JobRouterClient::new(&config)?);
    let app = bridge_routes(router, config.worker_profile.clone());

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        port = config.port,
        endpoint = %config.router_endpoint,
        "Routing bridge started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
