//! Resource model shared by the state builder and the diff engine
//!
//! A MaskinportenClient owns two externally observed resources: the API
//! client registered for the application and the client document stored in
//! the application's secret.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;

use crate::maskinporten::ClientInfo;

/// Key of the client document inside the application's secret
pub const SECRET_DATA_KEY: &str = "maskinporten-client.json";

pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// Kinds in reconciliation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ApiClient,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ApiClient => "ApiClient",
            ResourceKind::Secret => "Secret",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SecretResource {
    pub secret: Secret,
}

impl SecretResource {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    /// The client document, if the secret carries one.
    pub fn payload(&self) -> Option<&[u8]> {
        self.secret
            .data
            .as_ref()
            .and_then(|data| data.get(SECRET_DATA_KEY))
            .map(|bytes| bytes.0.as_slice())
    }

    pub fn has_payload(&self) -> bool {
        self.payload().is_some()
    }

    /// A copy of this secret with the client document set to `payload`.
    pub fn with_payload(&self, payload: Vec<u8>) -> Self {
        let mut secret = self.secret.clone();
        secret
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(SECRET_DATA_KEY.to_string(), ByteString(payload));
        Self { secret }
    }

    /// A copy of this secret with the client document removed.
    pub fn without_payload(&self) -> Self {
        let mut secret = self.secret.clone();
        if let Some(data) = secret.data.as_mut() {
            data.remove(SECRET_DATA_KEY);
        }
        Self { secret }
    }

    /// `namespace/name` for log and error messages
    pub fn display_name(&self) -> String {
        format!(
            "{}/{}",
            self.secret.metadata.namespace.as_deref().unwrap_or("default"),
            self.secret.metadata.name.as_deref().unwrap_or("<unnamed>")
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    ApiClient(ClientInfo),
    Secret(SecretResource),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::ApiClient(_) => ResourceKind::ApiClient,
            Resource::Secret(_) => ResourceKind::Secret,
        }
    }
}

/// At most one resource per kind, iterated in kind order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSet {
    resources: BTreeMap<ResourceKind, Resource>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `resource`, returning the resource of the same kind it replaced.
    pub fn insert(&mut self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.kind(), resource)
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.get(&kind)
    }

    pub fn api_client(&self) -> Option<&ClientInfo> {
        match self.get(ResourceKind::ApiClient) {
            Some(Resource::ApiClient(info)) => Some(info),
            _ => None,
        }
    }

    pub fn secret(&self) -> Option<&SecretResource> {
        match self.get(ResourceKind::Secret) {
            Some(Resource::Secret(secret)) => Some(secret),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<Resource> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut set = ResourceSet::new();
        for resource in iter {
            set.insert(resource);
        }
        set
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Upsert,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Upsert => "Upsert",
            ActionKind::Delete => "Delete",
        }
    }
}

/// A change applied by the diff engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciliationAction {
    pub kind: ActionKind,
    pub resource: Resource,
}

impl ReconciliationAction {
    pub fn upsert(resource: Resource) -> Self {
        Self {
            kind: ActionKind::Upsert,
            resource,
        }
    }

    pub fn delete(resource: Resource) -> Self {
        Self {
            kind: ActionKind::Delete,
            resource,
        }
    }
}

impl std::fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.resource.kind())
    }
}
