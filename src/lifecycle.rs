//! Worker lifecycle — registration and deregistration with the routing service.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::routing::{RegistrationStatus, RoutingGateway, Worker};

/// Owns the registration state of the workers driven by this process.
pub struct WorkerLifecycleController {
    gateway: Arc<dyn RoutingGateway>,
    workers: RwLock<HashMap<String, Worker>>,
}

impl WorkerLifecycleController {
    pub fn new(gateway: Arc<dyn RoutingGateway>) -> Self {
        Self {
            gateway,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Mark the worker available for offers.
    ///
    /// Safe to retry: the routing service merges repeated registrations into
    /// the same worker, so a later display name replaces the earlier one.
    /// Returns `false` instead of failing; `NotFound` means the worker cannot
    /// be registered under the bridge's current identity.
    pub async fn register(&self, worker_id: &str, display_name: &str) -> bool {
        match self.gateway.register_worker(worker_id, display_name).await {
            Ok(_) => {
                let mut workers = self.workers.write().await;
                let worker = workers
                    .entry(worker_id.to_string())
                    .or_insert_with(|| Worker::new(worker_id, display_name));
                worker.display_name = display_name.to_string();
                worker.status = RegistrationStatus::Registered;
                info!(worker_id = %worker_id, display_name = %display_name, "Worker registered");
                true
            }
            Err(GatewayError::NotFound { resource }) => {
                warn!(
                    worker_id = %worker_id,
                    resource = %resource,
                    "Worker cannot be registered under the current server identity"
                );
                false
            }
            Err(e) => {
                error!(worker_id = %worker_id, error = %e, "Worker registration failed");
                false
            }
        }
    }

    /// Turn the worker's availability off.
    ///
    /// Callers tearing down a session should log a failure and move on.
    pub async fn deregister(&self, worker_id: &str) -> Result<Value, GatewayError> {
        let body = self.gateway.deregister_worker(worker_id).await?;
        if let Some(worker) = self.workers.write().await.get_mut(worker_id) {
            worker.status = RegistrationStatus::Deregistered;
        }
        info!(worker_id = %worker_id, "Worker deregistered");
        Ok(body)
    }

    /// Snapshot of the local record for `worker_id`.
    pub async fn worker(&self, worker_id: &str) -> Option<Worker> {
        self.workers.read().await.get(worker_id).cloned()
    }

    /// Current status; unknown workers are `Unregistered`.
    pub async fn status(&self, worker_id: &str) -> RegistrationStatus {
        self.workers
            .read()
            .await
            .get(worker_id)
            .map(|w| w.status)
            .unwrap_or(RegistrationStatus::Unregistered)
    }
}
