//! MaskinportenClient Custom Resource Definition
//!
//! A MaskinportenClient declares that an application needs a Maskinporten API
//! client with a set of scopes. The operator registers the client and writes
//! its details into the application's secret under
//! `maskinporten-client.json`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Structured validation error for `MaskinportenClientSpec`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecValidationError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl SpecValidationError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            how_to_fix: how_to_fix.into(),
        }
    }
}

impl std::fmt::Display for SpecValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.how_to_fix)
    }
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "client.altinn.operator",
    version = "v1",
    kind = "MaskinportenClient",
    namespaced,
    status = "MaskinportenClientStatus",
    shortname = "mpc",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Last Synced","type":"date","jsonPath":".status.lastSynced"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MaskinportenClientSpec {
    /// Scopes the application's client is granted, in declaration order
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl MaskinportenClientSpec {
    /// Validate the spec before reconciling it.
    ///
    /// Each scope must be non-empty, contain no whitespace, and appear once.
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors = Vec::new();

        for (index, scope) in self.scopes.iter().enumerate() {
            let field = format!("spec.scopes[{index}]");
            if scope.trim().is_empty() {
                errors.push(SpecValidationError::new(
                    field,
                    "scope must not be empty",
                    "Remove the empty entry or provide a scope such as altinn:serviceowner/instances.read",
                ));
            } else if scope.chars().any(char::is_whitespace) {
                errors.push(SpecValidationError::new(
                    field,
                    format!("scope {scope:?} contains whitespace"),
                    "List each scope as its own entry",
                ));
            } else if self.scopes[..index].contains(scope) {
                errors.push(SpecValidationError::new(
                    field,
                    format!("scope {scope} is listed more than once"),
                    "Remove the duplicate entry",
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaskinportenClientStatus {
    /// "reconciled" or "error"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// RFC 3339 time of the last reconciliation that applied changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,

    /// Human-readable outcome of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
