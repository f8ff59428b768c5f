//! In-memory gateway used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use super::gateway::RoutingGateway;
use super::model::{AcceptedAssignment, JobDetail, JobOffer, WorkerAssignment};
use crate::error::GatewayError;

pub(crate) fn offer(offer_id: &str, job_id: &str) -> JobOffer {
    let now = Utc::now();
    JobOffer {
        offer_id: offer_id.to_string(),
        job_id: job_id.to_string(),
        capacity_cost: 1,
        offered_at: Some(now),
        expires_at: Some(now + chrono::Duration::seconds(300)),
    }
}

pub(crate) fn detail(job_id: &str, channel_reference: Option<&str>) -> JobDetail {
    JobDetail {
        id: job_id.to_string(),
        channel_reference: channel_reference.map(str::to_string),
        status: Some("offerSent".to_string()),
        ..Default::default()
    }
}

pub(crate) fn with_offers(offers: Vec<JobOffer>) -> WorkerAssignment {
    WorkerAssignment {
        offers,
        ..Default::default()
    }
}

/// Scripted gateway. Workers merge on re-registration like the real service.
#[derive(Default)]
pub(crate) struct FakeGateway {
    pub workers: Mutex<HashMap<String, String>>,
    pub register_error: Mutex<Option<GatewayError>>,
    pub deregister_error: Mutex<Option<GatewayError>>,
    /// Consumed front to back; an empty script answers with no offers.
    pub assignments: Mutex<VecDeque<Result<WorkerAssignment, GatewayError>>>,
    pub assignment_calls: AtomicUsize,
    pub assignment_latency: Mutex<Option<Duration>>,
    pub details: Mutex<HashMap<String, Result<JobDetail, GatewayError>>>,
    pub detail_calls: AtomicUsize,
    pub accept_error: Mutex<Option<GatewayError>>,
    pub accept_latency: Mutex<Option<Duration>>,
    pub accepted: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_assignment(&self, result: Result<WorkerAssignment, GatewayError>) {
        self.assignments.lock().unwrap().push_back(result);
    }

    pub fn set_detail(&self, job_id: &str, result: Result<JobDetail, GatewayError>) {
        self.details
            .lock()
            .unwrap()
            .insert(job_id.to_string(), result);
    }

    pub fn polls(&self) -> usize {
        self.assignment_calls.load(Ordering::SeqCst)
    }

    pub fn accept_calls(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

#[async_trait]
impl RoutingGateway for FakeGateway {
    async fn register_worker(
        &self,
        worker_id: &str,
        display_name: &str,
    ) -> Result<Value, GatewayError> {
        if let Some(e) = self.register_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.workers
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), display_name.to_string());
        Ok(json!({"id": worker_id, "labels": {"acsDisplayName": display_name}}))
    }

    async fn deregister_worker(&self, worker_id: &str) -> Result<Value, GatewayError> {
        if let Some(e) = self.deregister_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(json!({"id": worker_id, "availableForOffers": false}))
    }

    async fn get_assignment(&self, _worker_id: &str) -> Result<WorkerAssignment, GatewayError> {
        self.assignment_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.assignment_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.assignments
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(WorkerAssignment::default()))
    }

    async fn get_job_detail(&self, job_id: &str) -> Result<JobDetail, GatewayError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(GatewayError::NotFound {
                    resource: format!("job {job_id}"),
                })
            })
    }

    async fn accept_offer(
        &self,
        worker_id: &str,
        offer_id: &str,
    ) -> Result<AcceptedAssignment, GatewayError> {
        let latency = *self.accept_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.accepted
            .lock()
            .unwrap()
            .push((worker_id.to_string(), offer_id.to_string()));
        if let Some(e) = self.accept_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(json!({"assignmentId": format!("a-{offer_id}"), "workerId": worker_id}))
    }
}
