//! Offer poller — turns the assignment point-query into a one-shot discovery.
//!
//! Each polling session is a spawned task that queries the routing service
//! once per interval. The next query is scheduled only after the previous one
//! has returned, so queries never overlap. The session ends when:
//! 1. offers show up (the callback runs exactly once),
//! 2. the optional attempt budget runs out, or
//! 3. the `PollHandle` is stopped or dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::DeskConfig;
use crate::routing::{JobOffer, RoutingGateway};

/// How a polling session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Offers were found and handed to the callback.
    OffersFound,
    /// The attempt budget ran out without any offer.
    Exhausted,
    /// Polling was cancelled.
    Stopped,
}

/// Starts polling sessions for workers.
#[derive(Clone)]
pub struct OfferPoller {
    gateway: Arc<dyn RoutingGateway>,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl OfferPoller {
    pub fn new(gateway: Arc<dyn RoutingGateway>, interval: Duration) -> Self {
        Self {
            gateway,
            interval,
            max_attempts: None,
        }
    }

    pub fn from_config(gateway: Arc<dyn RoutingGateway>, config: &DeskConfig) -> Self {
        Self::new(gateway, config.poll_interval).with_max_attempts(config.max_poll_attempts)
    }

    /// Bound the number of queries per session (`None` = unbounded).
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Start polling for `worker_id`.
    ///
    /// The first query fires one interval after start. Query failures are
    /// logged and polling continues on the next tick.
    pub fn start_polling<F>(&self, worker_id: impl Into<String>, on_offers_found: F) -> PollHandle
    where
        F: FnOnce(Vec<JobOffer>) + Send + 'static,
    {
        let worker_id = worker_id.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let gateway = Arc::clone(&self.gateway);
        let period = self.interval.max(Duration::from_millis(1));
        let max_attempts = self.max_attempts;

        let handle = tokio::spawn(async move {
            info!(worker_id = %worker_id, interval_ms = period.as_millis() as u64, "Offer polling started");

            let mut tick = tokio::time::interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut attempts: u32 = 0;

            loop {
                if max_attempts.is_some_and(|max| attempts >= max) {
                    warn!(worker_id = %worker_id, attempts, "Offer polling gave up without offers");
                    return PollOutcome::Exhausted;
                }

                tick.tick().await;

                if shutdown.load(Ordering::Acquire) {
                    debug!(worker_id = %worker_id, "Offer polling stopped");
                    return PollOutcome::Stopped;
                }

                attempts += 1;
                match gateway.get_assignment(&worker_id).await {
                    Ok(assignment) if !assignment.offers.is_empty() => {
                        if shutdown.load(Ordering::Acquire) {
                            return PollOutcome::Stopped;
                        }
                        info!(
                            worker_id = %worker_id,
                            offers = assignment.offers.len(),
                            attempts,
                            "Job offers found"
                        );
                        on_offers_found(assignment.offers);
                        return PollOutcome::OffersFound;
                    }
                    Ok(_) => {
                        debug!(worker_id = %worker_id, attempts, "No offers yet");
                    }
                    Err(e) if e.is_transient() => {
                        warn!(worker_id = %worker_id, error = %e, "Offer poll failed, retrying next tick");
                    }
                    Err(e) => {
                        error!(
                            worker_id = %worker_id,
                            error = %e,
                            "Offer poll rejected by routing service, retrying next tick"
                        );
                    }
                }
            }
        });

        PollHandle {
            handle: Some(handle),
            shutdown: shutdown_flag,
        }
    }
}

/// Cancellation handle for one polling session.
///
/// Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollHandle {
    handle: Option<JoinHandle<PollOutcome>>,
    shutdown: Arc<AtomicBool>,
}

impl PollHandle {
    /// Stop polling. Safe to call repeatedly and after the session ended.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the session to end.
    pub async fn join(mut self) -> PollOutcome {
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(PollOutcome::Stopped),
            None => PollOutcome::Stopped,
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
