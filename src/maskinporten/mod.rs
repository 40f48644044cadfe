//! Maskinporten integration
//!
//! Everything the operator needs on the authorization server side: the
//! cached, retrying credential provider for the operator's own token, and the
//! registry of API clients provisioned for applications.

pub mod api_client;
pub mod cache;
pub mod config;
pub mod jwk;
pub mod registry;
pub mod retry;
pub mod types;

pub use api_client::{CredentialProvider, GrantClaims};
pub use cache::{ExpiringCache, Retriever};
pub use config::MaskinportenApiConfig;
pub use registry::ClientRegistry;
pub use retry::{RetryPolicy, RetryingExecutor};
pub use types::{ClientInfo, DiscoveryMetadata, TokenResponse};
