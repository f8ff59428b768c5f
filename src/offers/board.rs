//! Offer board — the offers currently shown to the worker.

use tokio::sync::RwLock;
use tracing::debug;

use crate::routing::JobOffer;

/// In-memory list of displayed offers for one session.
#[derive(Debug, Default)]
pub struct OfferBoard {
    offers: RwLock<Vec<JobOffer>>,
}

impl OfferBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the displayed offers with a fresh discovery result.
    pub async fn replace(&self, offers: Vec<JobOffer>) {
        debug!(count = offers.len(), "Offer board replaced");
        *self.offers.write().await = offers;
    }

    pub async fn list(&self) -> Vec<JobOffer> {
        self.offers.read().await.clone()
    }

    pub async fn get(&self, offer_id: &str) -> Option<JobOffer> {
        self.offers
            .read()
            .await
            .iter()
            .find(|o| o.offer_id == offer_id)
            .cloned()
    }

    /// Drop an offer so a dead one is no longer displayed.
    pub async fn remove(&self, offer_id: &str) -> Option<JobOffer> {
        let mut offers = self.offers.write().await;
        let idx = offers.iter().position(|o| o.offer_id == offer_id)?;
        Some(offers.remove(idx))
    }

    pub async fn clear(&self) {
        self.offers.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.offers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.offers.read().await.is_empty()
    }
}
