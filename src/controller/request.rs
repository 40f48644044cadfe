//! Mapping of a MaskinportenClient object to a reconciliation request

use kube::ResourceExt;

use super::finalizers::{has_finalizer, is_being_deleted};
use crate::crd::MaskinportenClient;
use crate::error::{Error, Result};

/// Deployment wide identity the operator runs under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorContext {
    /// Service owner short name, the first segment of every object name
    pub service_owner: String,
    /// Environment name such as `at22` or `tt02`
    pub environment: String,
}

impl OperatorContext {
    pub fn new(service_owner: impl Into<String>, environment: impl Into<String>) -> Result<Self> {
        let context = Self {
            service_owner: service_owner.into(),
            environment: environment.into(),
        };
        if context.service_owner.trim().is_empty() {
            return Err(Error::ConfigError(
                "service owner must not be empty".to_string(),
            ));
        }
        if context.environment.trim().is_empty() {
            return Err(Error::ConfigError("environment must not be empty".to_string()));
        }
        Ok(context)
    }
}

/// Where a declared object is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestLifecycleKind {
    /// First reconciliation, finalizer not yet attached
    Create,
    Update,
    /// Deletion requested, credentials must be removed
    Delete,
}

impl RequestLifecycleKind {
    pub fn of(client: &MaskinportenClient) -> Self {
        if is_being_deleted(client) {
            RequestLifecycleKind::Delete
        } else if has_finalizer(client) {
            RequestLifecycleKind::Update
        } else {
            RequestLifecycleKind::Create
        }
    }
}

impl std::fmt::Display for RequestLifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestLifecycleKind::Create => write!(f, "Create"),
            RequestLifecycleKind::Update => write!(f, "Update"),
            RequestLifecycleKind::Delete => write!(f, "Delete"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskinportenClientRequest {
    pub name: String,
    pub namespace: String,
    pub app_id: String,
    /// Value of the `app` label on the application's secret
    pub app_label: String,
}

impl MaskinportenClientRequest {
    /// Derive the request from an object named `<serviceOwner>-<appId>[-...]`.
    pub fn new(name: &str, namespace: &str, context: &OperatorContext) -> Result<Self> {
        let app_id = match name.split('-').nth(1) {
            Some(app_id) if !app_id.is_empty() => app_id,
            _ => {
                return Err(Error::ValidationError(format!(
                    "unexpected name format for MaskinportenClient resource: {name}"
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            app_id: app_id.to_string(),
            app_label: format!("{}-{}-deployment", context.service_owner, app_id),
        })
    }

    pub fn from_object(client: &MaskinportenClient, context: &OperatorContext) -> Result<Self> {
        let namespace = client.namespace().unwrap_or_else(|| "default".to_string());
        Self::new(&client.name_any(), &namespace, context)
    }
}
