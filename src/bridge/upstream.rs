//! Job-router REST client used by the bridge.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{BridgeConfig, WorkerProfile};
use crate::error::{ConfigError, GatewayError};
use crate::routing::http::read_value;

const MERGE_PATCH: &str = "application/merge-patch+json";

/// Upstream operations the bridge forwards to.
#[async_trait]
pub trait JobRouter: Send + Sync {
    /// Merge-patch the worker record, creating it if needed.
    async fn patch_worker(&self, worker_id: &str, patch: &Value) -> Result<Value, GatewayError>;

    async fn get_worker(&self, worker_id: &str) -> Result<Value, GatewayError>;

    async fn get_job(&self, job_id: &str) -> Result<Value, GatewayError>;

    async fn accept_offer(&self, worker_id: &str, offer_id: &str) -> Result<Value, GatewayError>;
}

/// reqwest client for `/routing/...` endpoints.
pub struct JobRouterClient {
    endpoint: Url,
    api_version: String,
    access_token: Option<SecretString>,
    client: reqwest::Client,
}

impl JobRouterClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&config.router_endpoint).map_err(|e| {
            ConfigError::InvalidValue {
                key: "ROUTER_ENDPOINT".into(),
                message: e.to_string(),
            }
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                key: "ROUTER_ENDPOINT".into(),
                message: format!("'{}' cannot be used as a base URL", config.router_endpoint),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "ROUTER_ENDPOINT".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            endpoint,
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("routing").extend(segments);
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }
}

#[async_trait]
impl JobRouter for JobRouterClient {
    async fn patch_worker(&self, worker_id: &str, patch: &Value) -> Result<Value, GatewayError> {
        let body = serde_json::to_vec(patch)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!(worker_id = %worker_id, "PATCH worker");

        let resp = self
            .authorize(self.client.patch(self.url(&["workers", worker_id])))
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body)
            .send()
            .await?;
        read_value(resp, &format!("worker {worker_id}")).await
    }

    async fn get_worker(&self, worker_id: &str) -> Result<Value, GatewayError> {
        let resp = self
            .authorize(self.client.get(self.url(&["workers", worker_id])))
            .send()
            .await?;
        read_value(resp, &format!("worker {worker_id}")).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Value, GatewayError> {
        let resp = self
            .authorize(self.client.get(self.url(&["jobs", job_id])))
            .send()
            .await?;
        read_value(resp, &format!("job {job_id}")).await
    }

    async fn accept_offer(&self, worker_id: &str, offer_id: &str) -> Result<Value, GatewayError> {
        let action = format!("{offer_id}:accept");
        debug!(worker_id = %worker_id, offer_id = %offer_id, "POST accept offer");

        let resp = self
            .authorize(
                self.client
                    .post(self.url(&["workers", worker_id, "offers", &action])),
            )
            .send()
            .await?;
        read_value(resp, &format!("offer {offer_id}")).await
    }
}

/// Merge-patch that makes a worker available under `profile`.
pub fn registration_patch(profile: &WorkerProfile, display_name: &str) -> Value {
    let mut labels = profile.labels.clone();
    labels.insert("acsDisplayName".to_string(), Value::from(display_name));

    json!({
        "capacity": profile.capacity,
        "queues": [profile.queue_id],
        "labels": labels,
        "channels": [{
            "channelId": profile.channel_id,
            "capacityCostPerJob": profile.capacity_cost_per_job
        }],
        "availableForOffers": true
    })
}

/// Merge-patch that turns a worker's availability off.
pub fn deregistration_patch() -> Value {
    json!({ "availableForOffers": false })
}
