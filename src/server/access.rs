//! Authorization decisions, recomputed per request
//!
//! The engine is a thin, deny-by-default front over the per-entity
//! capabilities. It never caches: access can depend on relationship state
//! that changes between requests.

use crate::core::resource::{Action, FieldAccess};
use crate::core::session::AuthContext;
use crate::core::store::{DataStore, InstanceRef};
use crate::server::registry::SchemaRegistry;
use std::sync::Arc;

/// Decides action and field permissions by delegating to the capability
/// bound to each entity.
#[derive(Clone)]
pub struct AccessEngine {
    store: Arc<dyn DataStore>,
    registry: Arc<SchemaRegistry>,
}

impl AccessEngine {
    pub fn new(store: Arc<dyn DataStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    /// May `ctx` perform `action` on `entity_name`?
    ///
    /// Unknown entities and capability failures deny.
    pub async fn can_access(
        &self,
        ctx: &AuthContext,
        entity_name: &str,
        action: Action<'_>,
    ) -> bool {
        let Some(capability) = self.registry.capability_for(entity_name) else {
            return false;
        };
        match capability
            .can_perform(action, ctx, self.store.as_ref())
            .await
        {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(
                    entity = entity_name,
                    error = %err,
                    "capability permission check failed, denying"
                );
                false
            }
        }
    }

    /// Visibility of `field` on `instance` for `ctx`.
    ///
    /// Unknown entity, unknown field, or capability failure all resolve to
    /// [`FieldAccess::None`].
    pub async fn field_access(
        &self,
        ctx: &AuthContext,
        instance: &InstanceRef,
        field: &str,
    ) -> FieldAccess {
        let Some(entity) = self.registry.entity(&instance.entity) else {
            return FieldAccess::None;
        };
        if !entity.has_field(field) {
            return FieldAccess::None;
        }
        let Some(capability) = self.registry.capability_for(&instance.entity) else {
            return FieldAccess::None;
        };
        match capability
            .field_access(instance, field, ctx, self.store.as_ref())
            .await
        {
            Ok(access) => access,
            Err(err) => {
                tracing::warn!(
                    entity = %instance.entity,
                    field,
                    error = %err,
                    "capability field check failed, denying"
                );
                FieldAccess::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::{FunctionOutcome, ResourceCapability};
    use crate::core::schema::{AttributeKind, EntityDescriptor};
    use crate::storage::InMemoryDataStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Capability whose checks always error, to exercise default-deny.
    struct FailingCapability;

    #[async_trait]
    impl ResourceCapability for FailingCapability {
        async fn can_perform(
            &self,
            _action: Action<'_>,
            _ctx: &AuthContext,
            _store: &dyn DataStore,
        ) -> Result<bool> {
            Err(anyhow::anyhow!("backend unavailable"))
        }

        async fn field_access(
            &self,
            _instance: &InstanceRef,
            _field: &str,
            _ctx: &AuthContext,
            _store: &dyn DataStore,
        ) -> Result<FieldAccess> {
            Err(anyhow::anyhow!("backend unavailable"))
        }

        async fn handle_function(
            &self,
            _instance: &InstanceRef,
            name: &str,
            _payload: Option<serde_json::Value>,
            _ctx: &AuthContext,
            _store: &dyn DataStore,
        ) -> Result<FunctionOutcome> {
            Err(anyhow::anyhow!("no function named '{}'", name))
        }
    }

    fn schema() -> Vec<EntityDescriptor> {
        vec![
            EntityDescriptor::new("User")
                .attribute("username", AttributeKind::Text)
                .attribute("password", AttributeKind::Text)
                .as_user_entity(),
            EntityDescriptor::new("Client")
                .attribute("secret", AttributeKind::Text)
                .as_client_entity(),
            EntityDescriptor::new("Session")
                .attribute("token", AttributeKind::Text)
                .to_one("user", "User")
                .to_one("client", "Client")
                .as_session_entity(),
            EntityDescriptor::new("Post").attribute("text", AttributeKind::Text),
        ]
    }

    fn engine_with(post_capability: Arc<dyn ResourceCapability>) -> AccessEngine {
        let schema = schema();
        let store = Arc::new(InMemoryDataStore::new(schema.clone()));
        let mut capabilities: HashMap<String, Arc<dyn ResourceCapability>> = schema
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    Arc::new(crate::core::resource::OpenAccess) as Arc<dyn ResourceCapability>,
                )
            })
            .collect();
        capabilities.insert("Post".to_string(), post_capability);
        let registry = Arc::new(SchemaRegistry::build(schema, capabilities, "/login").unwrap());
        AccessEngine::new(store, registry)
    }

    #[tokio::test]
    async fn test_unknown_entity_denies() {
        let engine = engine_with(Arc::new(crate::core::resource::OpenAccess));
        assert!(
            !engine
                .can_access(&AuthContext::Anonymous, "Ghost", Action::Create)
                .await
        );
        let instance = InstanceRef::new("Ghost", 1);
        assert_eq!(
            engine
                .field_access(&AuthContext::Anonymous, &instance, "text")
                .await,
            FieldAccess::None
        );
    }

    #[tokio::test]
    async fn test_unknown_field_denies() {
        let engine = engine_with(Arc::new(crate::core::resource::OpenAccess));
        let instance = InstanceRef::new("Post", 1);
        assert_eq!(
            engine
                .field_access(&AuthContext::Anonymous, &instance, "flavor")
                .await,
            FieldAccess::None
        );
    }

    #[tokio::test]
    async fn test_capability_error_denies() {
        let engine = engine_with(Arc::new(FailingCapability));
        assert!(
            !engine
                .can_access(&AuthContext::Anonymous, "Post", Action::Create)
                .await
        );
        let instance = InstanceRef::new("Post", 1);
        assert_eq!(
            engine
                .field_access(&AuthContext::Anonymous, &instance, "text")
                .await,
            FieldAccess::None
        );
    }

    #[tokio::test]
    async fn test_open_access_allows() {
        let engine = engine_with(Arc::new(crate::core::resource::OpenAccess));
        assert!(
            engine
                .can_access(&AuthContext::Anonymous, "Post", Action::Create)
                .await
        );
        let instance = InstanceRef::new("Post", 1);
        assert_eq!(
            engine
                .field_access(&AuthContext::Anonymous, &instance, "text")
                .await,
            FieldAccess::ReadWrite
        );
    }
}
