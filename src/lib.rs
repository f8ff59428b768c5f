//! Agent Desk — worker job-offer lifecycle against an external job router.

pub mod bridge;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod offers;
pub mod routing;
pub mod session;
