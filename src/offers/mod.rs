//! Offer discovery and acceptance.
//!
//! - `poller` — periodic assignment query, one-shot delivery, cancellable
//! - `board` — offers currently shown to the worker
//! - `binding` — thread reconciliation
//! - `acceptance` — detail → accept → bind state machine

pub mod acceptance;
pub mod binding;
pub mod board;
pub mod poller;

pub use acceptance::{
    AcceptanceOutcome, AcceptanceState, AcceptanceTransition, OfferAcceptanceCoordinator,
};
pub use binding::{BindingSource, ThreadBinding, resolve_binding};
pub use board::OfferBoard;
pub use poller::{OfferPoller, PollHandle, PollOutcome};
