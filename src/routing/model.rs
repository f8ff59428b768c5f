//! Worker, offer and job shapes exchanged with the routing service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Registration status of a worker, as seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Unregistered,
    Registered,
    Deregistered,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Deregistered => "deregistered",
        };
        write!(f, "{s}")
    }
}

/// A human agent registered with the routing service.
///
/// Capacity and queue membership are owned by the routing service; only the
/// identity and the last known registration status live here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worker {
    pub worker_id: String,
    pub display_name: String,
    pub status: RegistrationStatus,
}

impl Worker {
    pub fn new(worker_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            display_name: display_name.into(),
            status: RegistrationStatus::Unregistered,
        }
    }
}

/// A proposal from the routing service to assign a job to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOffer {
    pub offer_id: String,
    pub job_id: String,
    #[serde(default)]
    pub capacity_cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl JobOffer {
    /// Whether the offer can no longer be accepted at `now`. An offer with no
    /// known expiry never counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Decode offers one by one, skipping entries that don't parse.
fn lenient_offers<'de, D>(deserializer: D) -> Result<Vec<JobOffer>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<JobOffer>(value) {
            Ok(offer) => Some(offer),
            Err(e) => {
                warn!(error = %e, "Skipping malformed job offer");
                None
            }
        })
        .collect())
}

/// Body of the assignment query: the worker record with its pending offers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerAssignment {
    #[serde(default, deserialize_with = "lenient_offers")]
    pub offers: Vec<JobOffer>,
    /// Everything else the routing service returns, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full metadata for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(default)]
    pub id: String,
    /// Chat thread the job is tied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobDetail {
    /// The channel reference, treating an empty string as absent.
    pub fn thread_reference(&self) -> Option<&str> {
        self.channel_reference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Opaque body returned by a successful accept.
pub type AcceptedAssignment = Value;

/// Request body of `POST /acceptJobOffer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOfferRequest {
    pub worker_id: String,
    pub offer_id: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn offer_parses_camel_case() {
        let offer: JobOffer = serde_json::from_value(json!({
            "offerId": "o1",
            "jobId": "j1",
            "capacityCost": 1,
            "offeredAt": "2024-05-01T10:00:00Z",
            "expiresAt": "2024-05-01T10:05:00Z"
        }))
        .unwrap();

        assert_eq!(offer.offer_id, "o1");
        assert_eq!(offer.job_id, "j1");
        assert_eq!(offer.capacity_cost, 1);

        let before = Utc.with_ymd_and_hms(2024, 5, 1, 10, 4, 59).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        assert!(!offer.is_expired_at(before));
        assert!(offer.is_expired_at(at));
    }

    #[test]
    fn offer_without_timestamps_never_expires() {
        let offer: JobOffer =
            serde_json::from_value(json!({"offerId": "o1", "jobId": "j1"})).unwrap();

        assert_eq!(offer.offered_at, None);
        assert_eq!(offer.expires_at, None);
        assert!(!offer.is_expired_at(Utc::now()));
    }

    #[test]
    fn partial_offers_do_not_hide_complete_ones() {
        let assignment: WorkerAssignment = serde_json::from_value(json!({
            "id": "w1",
            "offers": [
                {"offerId": "o1", "jobId": "j1", "capacityCost": 1, "offeredAt": "2024-05-01T10:00:00Z"},
                {"jobId": "j-orphan"},
                {
                    "offerId": "o2",
                    "jobId": "j2",
                    "capacityCost": 1,
                    "offeredAt": "2024-05-01T10:00:00Z",
                    "expiresAt": "2024-05-01T10:05:00Z"
                }
            ]
        }))
        .unwrap();

        let ids: Vec<_> = assignment.offers.iter().map(|o| o.offer_id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o2"]);
        assert_eq!(assignment.offers[0].expires_at, None);
        assert!(assignment.offers[1].expires_at.is_some());
    }

    #[test]
    fn null_offers_is_empty() {
        let assignment: WorkerAssignment =
            serde_json::from_value(json!({"id": "w1", "offers": null})).unwrap();
        assert!(assignment.offers.is_empty());
    }

    #[test]
    fn assignment_without_offers_is_empty() {
        let assignment: WorkerAssignment = serde_json::from_value(json!({
            "id": "w1",
            "state": "active",
            "availableForOffers": true
        }))
        .unwrap();

        assert!(assignment.offers.is_empty());
        assert_eq!(assignment.extra["state"], "active");
    }

    #[test]
    fn job_detail_keeps_opaque_fields() {
        let detail: JobDetail = serde_json::from_value(json!({
            "id": "j1",
            "channelReference": "19:thread@thread.v2",
            "status": "assigned",
            "queueId": "queue-chat-human-agent",
            "priority": 1,
            "labels": {"lang": "en"},
            "etag": "abc"
        }))
        .unwrap();

        assert_eq!(detail.thread_reference(), Some("19:thread@thread.v2"));
        assert_eq!(detail.priority, Some(1));
        assert_eq!(detail.extra["etag"], "abc");
        assert_eq!(detail.extra["labels"]["lang"], "en");
    }

    #[test]
    fn blank_channel_reference_counts_as_missing() {
        let detail: JobDetail =
            serde_json::from_value(json!({"id": "j1", "channelReference": "  "})).unwrap();
        assert_eq!(detail.thread_reference(), None);

        let detail: JobDetail = serde_json::from_value(json!({"id": "j1"})).unwrap();
        assert_eq!(detail.thread_reference(), None);
    }
}
