//! Gateway: HTTP surface over the dispatcher and direct sender.
//!
//! Single port serves the notify routes, the inbound activity endpoint that feeds the
//! reference store, and a JSON health check.

mod notify;
mod server;

pub use server::{build_state, router, run_gateway, GatewayState};
