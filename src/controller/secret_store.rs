//! Access to application secrets
//!
//! [`SecretStore`] is the only way the controller reads or writes secrets.
//! [`KubeSecretStore`] talks to the API server; [`InMemorySecretStore`] backs
//! tests and local dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams, PostParams},
    Client,
};
use tracing::debug;

use crate::error::{Error, Result};

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Secrets in `namespace` matching an equality based `label_selector`
    /// such as `app=ttd-app1-deployment`.
    async fn list_labeled(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>>;

    /// Replace an existing secret, returning the stored version.
    async fn update(&self, secret: &Secret) -> Result<Secret>;
}

pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn list_labeled(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let (namespace, name) = secret_key(secret)?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        let updated = api.replace(&name, &PostParams::default(), secret).await?;
        debug!(secret = %name, namespace = %namespace, "Updated secret");
        Ok(updated)
    }
}

fn secret_key(secret: &Secret) -> Result<(String, String)> {
    let name = secret
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::ValidationError("secret has no name".to_string()))?;
    let namespace = secret
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    Ok((namespace, name))
}

/// Secrets held in process memory, keyed by namespace and name.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), Secret>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), Secret>> {
        self.secrets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or overwrite a secret, as `kubectl apply` would.
    pub fn insert(&self, secret: Secret) -> Result<()> {
        let key = secret_key(&secret)?;
        self.lock().insert(key, secret);
        Ok(())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

fn matches_selector(secret: &Secret, label_selector: &str) -> bool {
    let labels = secret.metadata.labels.as_ref();
    label_selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels
                .and_then(|labels| labels.get(key.trim()))
                .is_some_and(|actual| actual == value.trim()),
            None => labels.is_some_and(|labels| labels.contains_key(term)),
        })
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn list_labeled(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>> {
        Ok(self
            .lock()
            .iter()
            .filter(|((ns, _), secret)| ns == namespace && matches_selector(secret, label_selector))
            .map(|(_, secret)| secret.clone())
            .collect())
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let key = secret_key(secret)?;
        let mut secrets = self.lock();
        let existing = secrets
            .get_mut(&key)
            .ok_or_else(|| Error::MissingSecretError(format!("{}/{}", key.0, key.1)))?;

        let next_version = existing
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(next_version.to_string());
        *existing = stored.clone();
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn labeled(name: &str, namespace: &str, app: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_label() {
        let store = InMemorySecretStore::new();
        store.insert(labeled("a", "default", "ttd-app1-deployment")).unwrap();
        store.insert(labeled("b", "default", "ttd-app2-deployment")).unwrap();
        store.insert(labeled("c", "other", "ttd-app1-deployment")).unwrap();

        let found = store
            .list_labeled("default", "app=ttd-app1-deployment")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_update_bumps_resource_version() {
        let store = InMemorySecretStore::new();
        store.insert(labeled("a", "default", "x")).unwrap();

        let first = store.update(&labeled("a", "default", "x")).await.unwrap();
        let second = store.update(&first).await.unwrap();
        assert_eq!(first.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(second.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(store.get("default", "a"), Some(second));
    }

    #[tokio::test]
    async fn test_update_of_unknown_secret_fails() {
        let store = InMemorySecretStore::new();
        let err = store.update(&labeled("a", "default", "x")).await.unwrap_err();
        assert!(matches!(err, Error::MissingSecretError(_)));
    }

    #[test]
    fn test_selector_requires_every_term() {
        let secret = labeled("a", "default", "x");
        assert!(matches_selector(&secret, "app=x"));
        assert!(matches_selector(&secret, "app"));
        assert!(!matches_selector(&secret, "app=x,tier=web"));
        assert!(!matches_selector(&secret, "app=y"));
    }
}
