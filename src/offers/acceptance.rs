//! Offer acceptance — turns a selected offer into a bound chat session.
//!
//! Steps, strictly sequential per offer:
//! 1. fetch the job detail (abort on failure, never accept blind)
//! 2. note a missing channel reference, but keep going
//! 3. accept the offer (terminal failure, no retry)
//! 4. reconcile the thread binding
//! 5. wait the settle delay
//! 6. signal completion once, only when a thread was bound

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::binding::{ThreadBinding, resolve_binding};
use crate::config::DeskConfig;
use crate::error::AcceptError;
use crate::routing::{AcceptedAssignment, JobOffer, RoutingGateway};

/// State of one acceptance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceState {
    /// The worker picked the offer.
    Selected,
    /// Job detail is known.
    DetailFetched,
    /// Job detail could not be fetched; nothing was accepted.
    DetailFetchFailed,
    /// The routing service assigned the job to the worker.
    Accepted,
    /// The accept call failed; the offer may already be consumed.
    AcceptFailed,
    /// Accepted and bound to a chat thread.
    Bound,
}

impl AcceptanceState {
    pub fn can_transition_to(&self, target: AcceptanceState) -> bool {
        use AcceptanceState::*;

        matches!(
            (self, target),
            (Selected, DetailFetched)
                | (Selected, DetailFetchFailed)
                | (DetailFetched, Accepted)
                | (DetailFetched, AcceptFailed)
                | (Accepted, Bound)
        )
    }

    /// Failure states and `Bound` end the attempt. `Accepted` is only final
    /// when no thread could be bound.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DetailFetchFailed | Self::AcceptFailed | Self::Bound)
    }
}

impl std::fmt::Display for AcceptanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Selected => "selected",
            Self::DetailFetched => "detail_fetched",
            Self::DetailFetchFailed => "detail_fetch_failed",
            Self::Accepted => "accepted",
            Self::AcceptFailed => "accept_failed",
            Self::Bound => "bound",
        };
        write!(f, "{s}")
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceTransition {
    pub from: AcceptanceState,
    pub to: AcceptanceState,
    pub timestamp: DateTime<Utc>,
}

/// Tracks one offer through the acceptance state machine.
#[derive(Debug, Clone)]
struct AcceptanceAttempt {
    offer_id: String,
    state: AcceptanceState,
    transitions: Vec<AcceptanceTransition>,
}

impl AcceptanceAttempt {
    fn new(offer_id: &str) -> Self {
        Self {
            offer_id: offer_id.to_string(),
            state: AcceptanceState::Selected,
            transitions: Vec::new(),
        }
    }

    fn transition_to(&mut self, target: AcceptanceState) {
        if self.state.is_terminal() {
            warn!(
                offer_id = %self.offer_id,
                state = %self.state,
                to = %target,
                "Acceptance attempt already finished"
            );
            return;
        }
        if !self.state.can_transition_to(target) {
            error!(
                offer_id = %self.offer_id,
                from = %self.state,
                to = %target,
                "Invalid acceptance transition ignored"
            );
            return;
        }
        self.transitions.push(AcceptanceTransition {
            from: self.state,
            to: target,
            timestamp: Utc::now(),
        });
        self.state = target;
    }
}

/// Result of an acceptance that reached the routing service successfully.
#[derive(Debug, Clone)]
pub struct AcceptanceOutcome {
    pub offer_id: String,
    pub job_id: String,
    /// `Bound`, or `Accepted` when no thread could be resolved.
    pub state: AcceptanceState,
    pub assignment: AcceptedAssignment,
    pub binding: Option<ThreadBinding>,
    pub transitions: Vec<AcceptanceTransition>,
}

impl AcceptanceOutcome {
    pub fn is_bound(&self) -> bool {
        self.state == AcceptanceState::Bound
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.thread_id.as_str())
    }
}

/// Drives offers through acceptance, one attempt per worker at a time.
pub struct OfferAcceptanceCoordinator {
    gateway: Arc<dyn RoutingGateway>,
    settle_delay: Duration,
    in_flight: Mutex<HashSet<String>>,
}

impl OfferAcceptanceCoordinator {
    pub fn new(gateway: Arc<dyn RoutingGateway>, settle_delay: Duration) -> Self {
        Self {
            gateway,
            settle_delay,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(gateway: Arc<dyn RoutingGateway>, config: &DeskConfig) -> Self {
        Self::new(gateway, config.settle_delay)
    }

    /// Accept `offer` for `worker_id`.
    ///
    /// `existing_thread` is the thread the session already carries, if any.
    /// `on_complete` runs once, after the settle delay, when a thread was
    /// bound. The coordinator never writes session state itself: the binding
    /// is returned for the caller to apply.
    pub async fn accept<F>(
        &self,
        worker_id: &str,
        offer: &JobOffer,
        existing_thread: Option<&str>,
        on_complete: F,
    ) -> Result<AcceptanceOutcome, AcceptError>
    where
        F: FnOnce(&ThreadBinding) + Send,
    {
        let _guard = self.claim(worker_id)?;
        let mut attempt = AcceptanceAttempt::new(&offer.offer_id);

        // The routing service has the final say on expiry.
        if offer.is_expired_at(Utc::now()) {
            warn!(
                worker_id = %worker_id,
                offer_id = %offer.offer_id,
                "Offer looks expired, trying anyway"
            );
        }

        info!(
            worker_id = %worker_id,
            offer_id = %offer.offer_id,
            job_id = %offer.job_id,
            "Accepting job offer"
        );

        let detail = match self.gateway.get_job_detail(&offer.job_id).await {
            Ok(detail) => {
                attempt.transition_to(AcceptanceState::DetailFetched);
                detail
            }
            Err(e) => {
                attempt.transition_to(AcceptanceState::DetailFetchFailed);
                error!(job_id = %offer.job_id, error = %e, "Job detail fetch failed, offer not accepted");
                return Err(AcceptError::DetailFetchFailed {
                    job_id: offer.job_id.clone(),
                    source: e,
                });
            }
        };

        if detail.thread_reference().is_none() {
            warn!(
                job_id = %offer.job_id,
                "MissingThreadReference: job detail has no channel reference, accepting anyway"
            );
        }

        let assignment = match self.gateway.accept_offer(worker_id, &offer.offer_id).await {
            Ok(assignment) => {
                attempt.transition_to(AcceptanceState::Accepted);
                assignment
            }
            Err(e) => {
                attempt.transition_to(AcceptanceState::AcceptFailed);
                error!(offer_id = %offer.offer_id, error = %e, "Failed to accept job offer");
                return Err(AcceptError::AcceptFailed {
                    offer_id: offer.offer_id.clone(),
                    source: e,
                });
            }
        };

        let binding = resolve_binding(existing_thread, &detail);

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        match &binding {
            Some(binding) => {
                attempt.transition_to(AcceptanceState::Bound);
                info!(
                    worker_id = %worker_id,
                    offer_id = %offer.offer_id,
                    thread_id = %binding.thread_id,
                    source = ?binding.source,
                    "Job accepted and bound to thread"
                );
                on_complete(binding);
            }
            None => {
                warn!(
                    worker_id = %worker_id,
                    offer_id = %offer.offer_id,
                    "Job accepted but no thread could be bound"
                );
            }
        }

        Ok(AcceptanceOutcome {
            offer_id: offer.offer_id.clone(),
            job_id: offer.job_id.clone(),
            state: attempt.state,
            assignment,
            binding,
            transitions: attempt.transitions,
        })
    }

    fn claim(&self, worker_id: &str) -> Result<InFlightGuard<'_>, AcceptError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(worker_id.to_string()) {
            warn!(worker_id = %worker_id, "Rejected concurrent acceptance");
            return Err(AcceptError::AcceptanceInProgress {
                worker_id: worker_id.to_string(),
            });
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            worker_id: worker_id.to_string(),
        })
    }
}

/// Releases the per-worker acceptance slot on drop.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    worker_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.worker_id);
    }
}
