//! Routing service boundary.
//!
//! - `model` — worker, offer and job shapes
//! - `gateway` — the `RoutingGateway` trait
//! - `http` — reqwest implementation against the bridge endpoints

pub mod gateway;
pub mod http;
pub mod model;

#[cfg(test)]
pub(crate) mod testing;

pub use gateway::RoutingGateway;
pub use http::HttpRoutingGateway;
pub use model::{
    AcceptOfferRequest, AcceptedAssignment, JobDetail, JobOffer, RegistrationStatus, Worker,
    WorkerAssignment,
};
