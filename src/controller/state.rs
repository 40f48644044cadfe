//! Desired and current state of a MaskinportenClient request

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, instrument};

use super::request::{MaskinportenClientRequest, RequestLifecycleKind};
use super::resources::{Resource, ResourceSet, SecretResource, SECRET_TYPE_OPAQUE};
use super::secret_store::SecretStore;
use crate::crd::MaskinportenClientSpec;
use crate::error::{Error, Result};
use crate::maskinporten::{ClientInfo, ClientRegistry};

pub struct StateBuilder {
    registry: Arc<ClientRegistry>,
    secrets: Arc<dyn SecretStore>,
}

impl StateBuilder {
    pub fn new(registry: Arc<ClientRegistry>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { registry, secrets }
    }

    /// Resources the request should converge to.
    ///
    /// Outside of deletion this is the declared API client and the secret
    /// carrying its client document. During deletion only the bare secret
    /// shell remains, which tells the diff engine to strip the credentials.
    pub fn compute_desired(
        &self,
        request: &MaskinportenClientRequest,
        spec: &MaskinportenClientSpec,
        lifecycle: RequestLifecycleKind,
    ) -> Result<ResourceSet> {
        let mut desired = ResourceSet::new();
        let shell = SecretResource::new(secret_shell(request));

        if lifecycle == RequestLifecycleKind::Delete {
            desired.insert(Resource::Secret(shell));
            return Ok(desired);
        }

        let info = ClientInfo::new(request.app_id.clone(), spec.scopes.clone());
        let payload = serde_json::to_vec(&info)?;
        desired.insert(Resource::ApiClient(info));
        desired.insert(Resource::Secret(shell.with_payload(payload)));
        Ok(desired)
    }

    /// Resources as they exist right now.
    #[instrument(skip(self, request), fields(app_id = %request.app_id, namespace = %request.namespace))]
    pub async fn fetch_current(&self, request: &MaskinportenClientRequest) -> Result<ResourceSet> {
        let mut current = ResourceSet::new();

        let selector = format!("app={}", request.app_label);
        let mut secrets = self
            .secrets
            .list_labeled(&request.namespace, &selector)
            .await?;

        if secrets.len() > 1 {
            return Err(Error::StateConflictError(format!(
                "unexpected number of secrets found for {selector} in {}: {}",
                request.namespace,
                secrets.len()
            )));
        }

        if let Some(secret) = secrets.pop() {
            // The API server defaults an omitted type to Opaque.
            let secret_type = secret.type_.as_deref().unwrap_or(SECRET_TYPE_OPAQUE);
            if secret_type != SECRET_TYPE_OPAQUE {
                return Err(Error::UnexpectedTypeError(secret_type.to_string()));
            }
            current.insert(Resource::Secret(SecretResource::new(secret)));
        }

        if let Some(info) = self.registry.get(&request.app_id)? {
            current.insert(Resource::ApiClient(info));
        }

        debug!(resources = current.len(), "Fetched current state");
        Ok(current)
    }
}

fn secret_shell(request: &MaskinportenClientRequest) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(BTreeMap::from([(
                "app".to_string(),
                request.app_label.clone(),
            )])),
            ..Default::default()
        },
        type_: Some(SECRET_TYPE_OPAQUE.to_string()),
        data: Some(BTreeMap::new()),
        immutable: Some(false),
        ..Default::default()
    }
}
