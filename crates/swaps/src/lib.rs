//! Polling orchestrator for swap quote comparisons.
//!
//! A session starts with a fetch request, polls the aggregator service a
//! bounded number of cycles, annotates quotes with gas estimates, ranks
//! them and records the savings of the winner. Session state is owned by a
//! single scheduler task; timers, manual refetches and completing pipeline
//! workers all talk to it through a command channel, and a monotonic
//! sequence number guarantees that a stale response can never overwrite
//! state written by a newer one.

pub mod arguments;
pub mod cache;
pub mod controller;
pub mod session;

pub use {
    arguments::{Arguments, Config},
    controller::SwapsController,
    session::{FetchErrorKind, QuoteMetadata, SessionSnapshot},
};
