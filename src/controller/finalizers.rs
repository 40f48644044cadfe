//! Finalizer handling for MaskinportenClient cleanup
//!
//! The finalizer keeps a MaskinportenClient around after deletion is requested
//! until the operator has deleted the registered client and removed the
//! credentials from the application's secret.

use kube::{
    api::{Api, Patch, PatchParams},
    Client, ResourceExt,
};
use serde_json::json;
use tracing::info;

use crate::crd::MaskinportenClient;
use crate::error::Result;

pub const MASKINPORTEN_CLIENT_FINALIZER: &str = "client.altinn.operator/finalizer";

/// Field manager used for every patch the operator sends
pub const FIELD_MANAGER: &str = "maskinporten-operator";

/// Attach the finalizer if it is not present yet.
pub async fn add_finalizer(client: &Client, object: &MaskinportenClient) -> Result<()> {
    if has_finalizer(object) {
        return Ok(());
    }

    let namespace = object.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<MaskinportenClient> = Api::namespaced(client.clone(), &namespace);

    let mut finalizers: Vec<String> = object.finalizers().to_vec();
    finalizers.push(MASKINPORTEN_CLIENT_FINALIZER.to_string());

    let patch = json!({
        "metadata": {
            "finalizers": finalizers
        }
    });
    api.patch(
        &object.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    info!("Added finalizer to MaskinportenClient: {}", object.name_any());
    Ok(())
}

/// Detach the finalizer so Kubernetes can complete the deletion.
pub async fn remove_finalizer(client: &Client, object: &MaskinportenClient) -> Result<()> {
    let namespace = object.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<MaskinportenClient> = Api::namespaced(client.clone(), &namespace);

    let finalizers: Vec<String> = object
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != MASKINPORTEN_CLIENT_FINALIZER)
        .cloned()
        .collect();

    let patch = json!({
        "metadata": {
            "finalizers": finalizers
        }
    });
    api.patch(
        &object.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    info!("Removed finalizer from MaskinportenClient: {}", object.name_any());
    Ok(())
}

pub fn is_being_deleted(object: &MaskinportenClient) -> bool {
    object.metadata.deletion_timestamp.is_some()
}

pub fn has_finalizer(object: &MaskinportenClient) -> bool {
    object
        .finalizers()
        .iter()
        .any(|f| f == MASKINPORTEN_CLIENT_FINALIZER)
}
