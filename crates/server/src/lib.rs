//! HTTP surface of the signing relay.

pub mod api;
pub mod metrics;
pub mod state;
