//! HTTP gateway — talks to the routing bridge endpoints with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::gateway::RoutingGateway;
use super::model::{AcceptOfferRequest, AcceptedAssignment, JobDetail, WorkerAssignment};
use crate::config::DeskConfig;
use crate::error::{ConfigError, GatewayError};

/// `RoutingGateway` backed by the bridge's HTTP surface.
///
/// Create one per process and share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct HttpRoutingGateway {
    base: Url,
    client: reqwest::Client,
}

impl HttpRoutingGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "gateway_url".into(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                key: "gateway_url".into(),
                message: format!("'{base_url}' cannot be used as a base URL"),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "gateway_url".into(),
                message: e.to_string(),
            })?;
        Ok(Self { base, client })
    }

    pub fn from_config(config: &DeskConfig) -> Result<Self, ConfigError> {
        Self::new(&config.gateway_url, config.request_timeout)
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl RoutingGateway for HttpRoutingGateway {
    async fn register_worker(
        &self,
        worker_id: &str,
        display_name: &str,
    ) -> Result<Value, GatewayError> {
        let mut url = self.endpoint(&["registerWorker", worker_id]);
        url.query_pairs_mut()
            .append_pair("displayName", display_name);
        debug!(worker_id = %worker_id, "registerWorker");

        let resp = self.client.get(url).send().await?;
        read_value(resp, &format!("worker {worker_id}")).await
    }

    async fn deregister_worker(&self, worker_id: &str) -> Result<Value, GatewayError> {
        let url = self.endpoint(&["deregisterWorker", worker_id]);
        debug!(worker_id = %worker_id, "deregisterWorker");

        let resp = self.client.get(url).send().await?;
        read_value(resp, &format!("worker {worker_id}")).await
    }

    async fn get_assignment(&self, worker_id: &str) -> Result<WorkerAssignment, GatewayError> {
        let url = self.endpoint(&["getJobAssignment", worker_id]);
        let resp = self.client.get(url).send().await?;
        read_json(resp, &format!("assignment for worker {worker_id}")).await
    }

    async fn get_job_detail(&self, job_id: &str) -> Result<JobDetail, GatewayError> {
        let url = self.endpoint(&["getJobDetail", job_id]);
        let resp = self.client.get(url).send().await?;
        read_json(resp, &format!("job {job_id}")).await
    }

    async fn accept_offer(
        &self,
        worker_id: &str,
        offer_id: &str,
    ) -> Result<AcceptedAssignment, GatewayError> {
        let url = self.endpoint(&["acceptJobOffer"]);
        let body = AcceptOfferRequest {
            worker_id: worker_id.to_string(),
            offer_id: offer_id.to_string(),
        };
        debug!(worker_id = %worker_id, offer_id = %offer_id, "acceptJobOffer");

        let resp = self.client.post(url).json(&body).send().await?;
        read_value(resp, &format!("offer {offer_id}")).await
    }
}

/// Decode a success body as `T`, or map the status to a `GatewayError`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    resource: &str,
) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::from_status(status, resource, &body));
    }
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

/// Like `read_json`, but an empty success body is `Value::Null`.
pub(crate) async fn read_value(resp: reqwest::Response, resource: &str) -> Result<Value, GatewayError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(GatewayError::from_status(status, resource, &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn gateway(server: &MockServer) -> HttpRoutingGateway {
        HttpRoutingGateway::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn register_sends_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/registerWorker/w1"))
            .and(query_param("displayName", "Ada Lovelace"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "w1"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = gateway(&server)
            .register_worker("w1", "Ada Lovelace")
            .await
            .unwrap();
        assert_eq!(body["id"], "w1");
    }

    #[tokio::test]
    async fn register_not_found_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/registerWorker/w1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .register_worker("w1", "Ada")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn assignment_parses_offers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getJobAssignment/w1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "w1",
                "offers": [{
                    "offerId": "o1",
                    "jobId": "j1",
                    "capacityCost": 1,
                    "offeredAt": "2024-05-01T10:00:00Z",
                    "expiresAt": "2024-05-01T10:05:00Z"
                }]
            })))
            .mount(&server)
            .await;

        let assignment = gateway(&server).get_assignment("w1").await.unwrap();
        assert_eq!(assignment.offers.len(), 1);
        assert_eq!(assignment.offers[0].offer_id, "o1");
    }

    #[tokio::test]
    async fn assignment_keeps_valid_offers_next_to_partial_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getJobAssignment/w1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "w1",
                "offers": [
                    {"offerId": "o1", "jobId": "j1", "capacityCost": 1, "offeredAt": "2024-05-01T10:00:00Z"},
                    {"offerId": 7},
                    {
                        "offerId": "o2",
                        "jobId": "j2",
                        "capacityCost": 1,
                        "offeredAt": "2024-05-01T10:00:00Z",
                        "expiresAt": "2024-05-01T10:05:00Z"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let assignment = gateway(&server).get_assignment("w1").await.unwrap();
        let ids: Vec<_> = assignment.offers.iter().map(|o| o.offer_id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2"]);
    }

    #[tokio::test]
    async fn job_detail_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getJobDetail/j1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = gateway(&server).get_job_detail("j1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn accept_posts_worker_and_offer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acceptJobOffer"))
            .and(body_json(json!({"workerId": "w1", "offerId": "o1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"assignmentId": "a1", "jobId": "j1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let accepted = gateway(&server).accept_offer("w1", "o1").await.unwrap();
        assert_eq!(accepted["assignmentId"], "a1");
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deregisterWorker/w1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let body = gateway(&server).deregister_worker("w1").await.unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn ids_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getJobDetail/job%2F1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "job/1"})))
            .mount(&server)
            .await;

        let detail = gateway(&server).get_job_detail("job/1").await.unwrap();
        assert_eq!(detail.id, "job/1");
    }

    #[test]
    fn rejects_non_base_url() {
        assert!(HttpRoutingGateway::new("mailto:desk@example.com", Duration::from_secs(1)).is_err());
        assert!(HttpRoutingGateway::new("not a url", Duration::from_secs(1)).is_err());
    }
}
