//! Maskinporten operator: Kubernetes operator for Maskinporten API clients
//!
//! Watches `MaskinportenClient` resources, registers an API client for each
//! application, and keeps the client document in the application's secret in
//! sync. The operator authenticates against Maskinporten with the JWT-bearer
//! grant through a cached, retrying credential provider.

pub mod controller;
pub mod crd;
pub mod error;
pub mod maskinporten;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
