//! Worker session — the surface the presentation layer drives.
//!
//! One session per worker: register, wait for offers, accept one, end.
//! The session is the single writer of its thread id.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::DeskConfig;
use crate::error::{AcceptError, SessionError};
use crate::lifecycle::WorkerLifecycleController;
use crate::offers::{
    AcceptanceOutcome, OfferAcceptanceCoordinator, OfferBoard, OfferPoller, PollHandle,
    ThreadBinding,
};
use crate::routing::{JobOffer, RegistrationStatus, RoutingGateway};

/// Receives the resolved thread and the signal to move on to chat.
#[async_trait]
pub trait SessionBinder: Send + Sync {
    async fn bind(&self, worker_id: &str, binding: &ThreadBinding);
}

/// Binder that only logs; the chat UI transition lives elsewhere.
#[derive(Debug, Default)]
pub struct LoggingBinder;

#[async_trait]
impl SessionBinder for LoggingBinder {
    async fn bind(&self, worker_id: &str, binding: &ThreadBinding) {
        info!(
            worker_id = %worker_id,
            thread_id = %binding.thread_id,
            source = ?binding.source,
            "Proceeding to chat"
        );
    }
}

/// Components shared by every session in the process.
#[derive(Clone)]
pub struct SessionDeps {
    pub lifecycle: Arc<WorkerLifecycleController>,
    pub poller: OfferPoller,
    pub coordinator: Arc<OfferAcceptanceCoordinator>,
    pub binder: Arc<dyn SessionBinder>,
}

impl SessionDeps {
    /// Wire every component around one gateway instance.
    pub fn new(
        gateway: Arc<dyn RoutingGateway>,
        config: &DeskConfig,
        binder: Arc<dyn SessionBinder>,
    ) -> Self {
        Self {
            lifecycle: Arc::new(WorkerLifecycleController::new(Arc::clone(&gateway))),
            poller: OfferPoller::from_config(Arc::clone(&gateway), config),
            coordinator: Arc::new(OfferAcceptanceCoordinator::from_config(gateway, config)),
            binder,
        }
    }
}

/// A single worker's pass from registration to a bound chat thread.
pub struct WorkerSession {
    worker_id: String,
    display_name: String,
    deps: SessionDeps,
    board: Arc<OfferBoard>,
    thread_id: Option<String>,
    polling: Option<PollHandle>,
    found_rx: Option<mpsc::Receiver<Vec<JobOffer>>>,
}

impl WorkerSession {
    /// `thread_id` is a thread carried over from a previous session, if any.
    pub fn new(
        deps: SessionDeps,
        worker_id: impl Into<String>,
        display_name: impl Into<String>,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            display_name: display_name.into(),
            deps,
            board: Arc::new(OfferBoard::new()),
            thread_id,
            polling: None,
            found_rx: None,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The thread id the session is bound to, if any.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn board(&self) -> &Arc<OfferBoard> {
        &self.board
    }

    /// Register the worker. A rejected registration blocks waiting for offers.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self
            .deps
            .lifecycle
            .register(&self.worker_id, &self.display_name)
            .await
        {
            Ok(())
        } else {
            Err(SessionError::RegistrationRejected {
                worker_id: self.worker_id.clone(),
            })
        }
    }

    /// Start (or restart) polling for offers.
    ///
    /// Found offers are delivered by `next_offers`, which also puts them on
    /// the board.
    pub async fn start_waiting(&mut self) -> Result<(), SessionError> {
        if self.deps.lifecycle.status(&self.worker_id).await != RegistrationStatus::Registered {
            return Err(SessionError::NotRegistered {
                worker_id: self.worker_id.clone(),
            });
        }
        self.stop_waiting();

        let (tx, rx) = mpsc::channel(1);
        let handle = self
            .deps
            .poller
            .start_polling(self.worker_id.clone(), move |offers| {
                // Closed receiver means this polling session was superseded.
                let _ = tx.try_send(offers);
            });

        self.polling = Some(handle);
        self.found_rx = Some(rx);
        Ok(())
    }

    /// Wait for the current polling session to surface offers.
    ///
    /// `None` when polling ended without offers or was never started.
    pub async fn next_offers(&mut self) -> Option<Vec<JobOffer>> {
        let rx = self.found_rx.as_mut()?;
        let offers = rx.recv().await;
        self.found_rx = None;
        let offers = offers?;
        self.board.replace(offers.clone()).await;
        Some(offers)
    }

    /// Stop polling. Safe to call at any time.
    pub fn stop_waiting(&mut self) {
        if let Some(handle) = self.polling.take() {
            handle.stop();
        }
        self.found_rx = None;
    }

    /// Accept an offer from the board.
    ///
    /// On failure the offer is dropped from the board and the error is
    /// returned for display; re-poll for fresh offers instead of retrying.
    pub async fn accept(&mut self, offer_id: &str) -> Result<AcceptanceOutcome, SessionError> {
        let offer = self
            .board
            .get(offer_id)
            .await
            .ok_or_else(|| AcceptError::UnknownOffer {
                offer_id: offer_id.to_string(),
            })?;

        let result = self
            .deps
            .coordinator
            .accept(&self.worker_id, &offer, self.thread_id.as_deref(), |_| {})
            .await;

        match result {
            Ok(outcome) => {
                self.stop_waiting();
                self.board.clear().await;
                if let Some(binding) = &outcome.binding {
                    self.thread_id = Some(binding.thread_id.clone());
                    self.deps.binder.bind(&self.worker_id, binding).await;
                }
                Ok(outcome)
            }
            Err(e) => {
                self.board.remove(offer_id).await;
                warn!(worker_id = %self.worker_id, offer_id = %offer_id, error = %e, "Offer acceptance failed");
                Err(e.into())
            }
        }
    }

    /// Stop polling and deregister. Deregistration failure does not block teardown.
    pub async fn end(mut self) {
        self.stop_waiting();
        if let Err(e) = self.deps.lifecycle.deregister(&self.worker_id).await {
            warn!(worker_id = %self.worker_id, error = %e, "Deregistration failed during teardown");
        }
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        self.stop_waiting();
    }
}
