//! Unit tests for the resource model

#[cfg(test)]
mod tests {
    use crate::controller::resources::*;
    use crate::maskinporten::ClientInfo;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn secret() -> SecretResource {
        SecretResource::new(Secret {
            metadata: ObjectMeta {
                name: Some("ttd-app1".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_resource_set_keeps_one_per_kind() {
        let mut set = ResourceSet::new();
        assert!(set
            .insert(Resource::ApiClient(ClientInfo::new("app1", vec![])))
            .is_none());
        let replaced = set.insert(Resource::ApiClient(ClientInfo::new("app2", vec![])));

        assert!(matches!(replaced, Some(Resource::ApiClient(info)) if info.app_id == "app1"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.api_client().unwrap().app_id, "app2");
    }

    #[test]
    fn test_resource_set_iterates_in_kind_order() {
        let set: ResourceSet = vec![
            Resource::Secret(secret()),
            Resource::ApiClient(ClientInfo::new("app1", vec![])),
        ]
        .into_iter()
        .collect();

        let kinds: Vec<_> = set.iter().map(Resource::kind).collect();
        assert_eq!(kinds, vec![ResourceKind::ApiClient, ResourceKind::Secret]);
    }

    #[test]
    fn test_payload_is_copied_not_mutated() {
        let original = secret();
        assert!(!original.has_payload());

        let with = original.with_payload(b"{}".to_vec());
        assert_eq!(with.payload(), Some(&b"{}"[..]));
        assert!(!original.has_payload());

        let without = with.without_payload();
        assert!(!without.has_payload());
        assert!(with.has_payload());
        assert_eq!(without.secret.data.as_ref().map(|d| d.len()), Some(0));
    }

    #[test]
    fn test_without_payload_keeps_other_keys() {
        let mut raw = secret().with_payload(b"{}".to_vec());
        raw.secret.data.as_mut().unwrap().insert(
            "other".to_string(),
            k8s_openapi::ByteString(b"keep".to_vec()),
        );
        let stripped = raw.without_payload();
        assert!(stripped.secret.data.unwrap().contains_key("other"));
    }

    #[test]
    fn test_action_display() {
        let action = ReconciliationAction::delete(Resource::Secret(secret()));
        assert_eq!(action.to_string(), "Delete Secret");
        assert_eq!(secret().display_name(), "default/ttd-app1");
    }
}
