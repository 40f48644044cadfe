//! Response bodies of the REST API

use serde::{Deserialize, Serialize};

use crate::maskinporten::ClientInfo;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    /// Authorization server the operator authenticated against
    pub issuer: String,
}

/// A registered client without any credential material
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub app_id: String,
    pub client_id: String,
    pub scopes: Vec<String>,
}

impl From<ClientInfo> for ClientSummary {
    fn from(info: ClientInfo) -> Self {
        Self {
            app_id: info.app_id,
            client_id: info.id,
            scopes: info.scopes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientListResponse {
    pub items: Vec<ClientSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
