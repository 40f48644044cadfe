//! REST API module
//!
//! Operational HTTP surface: liveness, readiness against Maskinporten,
//! Prometheus metrics, and a read-only view of the client registry.

mod dto;
mod handlers;
mod server;

pub use server::{router, run_server, ApiState};
