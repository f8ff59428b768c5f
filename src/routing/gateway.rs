//! RoutingGateway trait — the seam to the external job-routing service.

use async_trait::async_trait;
use serde_json::Value;

use super::model::{AcceptedAssignment, JobDetail, WorkerAssignment};
use crate::error::GatewayError;

/// Request/response bridge to the job-routing service.
///
/// Every call is a single round-trip. Implementations never retry; callers
/// decide what a failure means for them.
#[async_trait]
pub trait RoutingGateway: Send + Sync {
    /// Mark the worker available under the bridge's fixed profile.
    /// Repeated calls merge into the existing worker.
    async fn register_worker(
        &self,
        worker_id: &str,
        display_name: &str,
    ) -> Result<Value, GatewayError>;

    /// Turn the worker's availability off.
    async fn deregister_worker(&self, worker_id: &str) -> Result<Value, GatewayError>;

    /// Current assignment state, including pending offers.
    async fn get_assignment(&self, worker_id: &str) -> Result<WorkerAssignment, GatewayError>;

    async fn get_job_detail(&self, job_id: &str) -> Result<JobDetail, GatewayError>;

    async fn accept_offer(
        &self,
        worker_id: &str,
        offer_id: &str,
    ) -> Result<AcceptedAssignment, GatewayError>;
}
