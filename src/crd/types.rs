//! Shared status types for the operator's custom resources

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// Condition for status reporting (Kubernetes convention)
///
/// ```rust,no_run
/// use maskinporten_operator::crd::Condition;
///
/// let condition = Condition::ready(true, "Reconciled", "Client and secret are in sync");
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition ("Ready" or "Progressing")
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False", or "Unknown"
    pub status: String,
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    pub message: String,
    /// The .metadata.generation the condition was computed for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    pub fn ready(status: bool, reason: &str, message: &str) -> Self {
        Self::new(CONDITION_READY, status, reason, message)
    }

    pub fn progressing(reason: &str, message: &str) -> Self {
        Self::new(CONDITION_PROGRESSING, true, reason, message)
    }

    fn new(type_: &str, status: bool, reason: &str, message: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: chrono::Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
            observed_generation: None,
        }
    }

    pub fn with_observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = Some(generation);
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}
