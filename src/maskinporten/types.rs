//! Wire types shared between the Maskinporten API client and the controller

use serde::{Deserialize, Serialize};

/// A registered Maskinporten API client for one application.
///
/// This is also the JSON document stored in the application's secret.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Identifier assigned when the client is registered. Empty until then.
    #[serde(rename = "clientId")]
    pub id: String,
    pub app_id: String,
    pub scopes: Vec<String>,
}

impl ClientInfo {
    pub fn new(app_id: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            id: String::new(),
            app_id: app_id.into(),
            scopes,
        }
    }

    /// Compares the declared parts of two records (`app_id` and `scopes`).
    ///
    /// Scopes are compared element-wise in order, so a reordered scope list
    /// counts as a change.
    pub fn same_declaration(&self, other: &ClientInfo) -> bool {
        self.app_id == other.app_id && self.scopes == other.scopes
    }
}

/// `/.well-known/oauth-authorization-server` document
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DiscoveryMetadata {
    pub issuer: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_signing_alg_values_supported: Vec<String>,
}

/// Token endpoint response
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}
