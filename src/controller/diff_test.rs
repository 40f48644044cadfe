//! Unit tests for the diff engine
//!
//! States are built with the real StateBuilder over an in-memory secret
//! store, the way the reconciler builds them.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use crate::controller::diff::DiffEngine;
    use crate::controller::request::{
        MaskinportenClientRequest, OperatorContext, RequestLifecycleKind,
    };
    use crate::controller::resources::{
        ActionKind, Resource, ResourceKind, ResourceSet, SecretResource, SECRET_DATA_KEY,
    };
    use crate::controller::secret_store::{InMemorySecretStore, SecretStore};
    use crate::controller::state::StateBuilder;
    use crate::crd::MaskinportenClientSpec;
    use crate::error::{Error, Result};
    use crate::maskinporten::{ClientInfo, ClientRegistry};

    struct Fixture {
        registry: Arc<ClientRegistry>,
        store: Arc<InMemorySecretStore>,
        state: StateBuilder,
        engine: DiffEngine,
        request: MaskinportenClientRequest,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ClientRegistry::new());
        let store = Arc::new(InMemorySecretStore::new());
        let context = OperatorContext::new("ttd", "local").unwrap();
        Fixture {
            state: StateBuilder::new(Arc::clone(&registry), store.clone()),
            engine: DiffEngine::new(Arc::clone(&registry), store.clone()),
            request: MaskinportenClientRequest::new("ttd-app1", "default", &context).unwrap(),
            registry,
            store,
        }
    }

    fn spec(scopes: &[&str]) -> MaskinportenClientSpec {
        MaskinportenClientSpec {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The empty secret the application deployment ships with.
    fn provision_shell(f: &Fixture) {
        f.store
            .insert(Secret {
                metadata: ObjectMeta {
                    name: Some(f.request.name.clone()),
                    namespace: Some(f.request.namespace.clone()),
                    labels: Some(BTreeMap::from([(
                        "app".to_string(),
                        f.request.app_label.clone(),
                    )])),
                    ..Default::default()
                },
                type_: Some("Opaque".to_string()),
                ..Default::default()
            })
            .unwrap();
    }

    fn stored_payload(f: &Fixture) -> Option<ClientInfo> {
        f.store
            .get(&f.request.namespace, &f.request.name)
            .and_then(|s| s.data)
            .and_then(|data| data.get(SECRET_DATA_KEY).cloned())
            .map(|bytes| serde_json::from_slice(&bytes.0).unwrap())
    }

    async fn run(
        f: &Fixture,
        spec: &MaskinportenClientSpec,
        lifecycle: RequestLifecycleKind,
    ) -> Vec<(ActionKind, ResourceKind)> {
        let desired = f.state.compute_desired(&f.request, spec, lifecycle).unwrap();
        let current = f.state.fetch_current(&f.request).await.unwrap();
        f.engine
            .reconcile(&current, &desired)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.kind, a.resource.kind()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_upserts_client_then_secret() {
        let f = fixture();
        provision_shell(&f);

        let actions = run(&f, &spec(&["scope1"]), RequestLifecycleKind::Create).await;
        assert_eq!(
            actions,
            vec![
                (ActionKind::Upsert, ResourceKind::ApiClient),
                (ActionKind::Upsert, ResourceKind::Secret)
            ]
        );

        let registered = f.registry.get("app1").unwrap().unwrap();
        let payload = stored_payload(&f).unwrap();
        assert_eq!(payload, registered);
        assert!(!payload.id.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let f = fixture();
        provision_shell(&f);

        run(&f, &spec(&["scope1"]), RequestLifecycleKind::Create).await;
        let actions = run(&f, &spec(&["scope1"]), RequestLifecycleKind::Update).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_scope_change_rewrites_secret() {
        let f = fixture();
        provision_shell(&f);
        run(&f, &spec(&["scope1"]), RequestLifecycleKind::Create).await;
        let id = f.registry.get("app1").unwrap().unwrap().id;

        let actions = run(&f, &spec(&["scope1", "scope2"]), RequestLifecycleKind::Update).await;
        assert_eq!(actions, vec![(ActionKind::Upsert, ResourceKind::Secret)]);

        let payload = stored_payload(&f).unwrap();
        assert_eq!(payload.id, id);
        assert_eq!(payload.scopes, vec!["scope1", "scope2"]);
    }

    #[tokio::test]
    async fn test_scope_reorder_counts_as_change() {
        let f = fixture();
        provision_shell(&f);
        run(&f, &spec(&["a", "b"]), RequestLifecycleKind::Create).await;

        let actions = run(&f, &spec(&["b", "a"]), RequestLifecycleKind::Update).await;
        assert_eq!(actions, vec![(ActionKind::Upsert, ResourceKind::Secret)]);
    }

    #[tokio::test]
    async fn test_empty_desired_deletes_client_and_payload() {
        let f = fixture();
        provision_shell(&f);
        run(&f, &spec(&["scope1"]), RequestLifecycleKind::Create).await;

        let current = f.state.fetch_current(&f.request).await.unwrap();
        let actions = f
            .engine
            .reconcile(&current, &ResourceSet::new())
            .await
            .unwrap();

        let kinds: Vec<_> = actions.iter().map(|a| (a.kind, a.resource.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::Delete, ResourceKind::ApiClient),
                (ActionKind::Delete, ResourceKind::Secret)
            ]
        );
        assert!(f.registry.is_empty());
        assert!(stored_payload(&f).is_none());
        // The secret itself stays.
        assert!(f.store.get("default", "ttd-app1").is_some());
    }

    #[tokio::test]
    async fn test_delete_lifecycle_strips_credentials() {
        let f = fixture();
        provision_shell(&f);
        run(&f, &spec(&["scope1"]), RequestLifecycleKind::Create).await;

        let actions = run(&f, &spec(&["scope1"]), RequestLifecycleKind::Delete).await;
        assert_eq!(
            actions,
            vec![
                (ActionKind::Delete, ResourceKind::ApiClient),
                (ActionKind::Delete, ResourceKind::Secret)
            ]
        );
        assert!(run(&f, &spec(&["scope1"]), RequestLifecycleKind::Delete)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_reports_applied_actions() {
        let f = fixture();
        let desired = f
            .state
            .compute_desired(&f.request, &spec(&["scope1"]), RequestLifecycleKind::Create)
            .unwrap();
        let current = f.state.fetch_current(&f.request).await.unwrap();

        let err = f.engine.reconcile(&current, &desired).await.unwrap_err();
        assert!(matches!(err.source, Error::MissingSecretError(_)));
        assert_eq!(err.applied.len(), 1);
        assert!(matches!(
            &err.applied[0].resource,
            Resource::ApiClient(info) if info.app_id == "app1"
        ));
        // The client registered before the failure stays registered.
        assert!(f.registry.get("app1").unwrap().is_some());
        assert!(err.to_string().contains("1 applied action"));
    }

    /// Lists like the in-memory store but refuses every write.
    struct ReadOnlyStore(InMemorySecretStore);

    #[async_trait]
    impl SecretStore for ReadOnlyStore {
        async fn list_labeled(&self, namespace: &str, selector: &str) -> Result<Vec<Secret>> {
            self.0.list_labeled(namespace, selector).await
        }

        async fn update(&self, _secret: &Secret) -> Result<Secret> {
            Err(Error::ServerError {
                status: 503,
                url: "https://kubernetes.default.svc".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_secret_write_in_reverse_pass() {
        let registry = Arc::new(ClientRegistry::new());
        let (info, _) = registry.reconcile(&ClientInfo::new("app1", vec![])).unwrap();
        let engine = DiffEngine::new(
            Arc::clone(&registry),
            Arc::new(ReadOnlyStore(InMemorySecretStore::new())),
        );

        let secret = SecretResource::new(Secret {
            metadata: ObjectMeta {
                name: Some("ttd-app1".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .with_payload(serde_json::to_vec(&info).unwrap());
        let current: ResourceSet = vec![Resource::ApiClient(info), Resource::Secret(secret)]
            .into_iter()
            .collect();

        let err = engine
            .reconcile(&current, &ResourceSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err.source, Error::ServerError { status: 503, .. }));
        assert_eq!(err.applied.len(), 1);
        assert_eq!(err.applied[0].kind, ActionKind::Delete);
        assert!(registry.is_empty());
    }
}
