//! Shared social-graph fixture: schema, capabilities, and seed helpers
//!
//! Four entities: User (owns credentials), Client (API consumer identity),
//! Session (issued at login), and Post (user content with a `like`
//! function). The capabilities express ownership rules the way an
//! application would: creators edit their posts, everyone else reads them.

#![allow(dead_code)]

use gatekit::prelude::*;
use std::sync::Arc;

pub fn social_schema() -> Vec<EntityDescriptor> {
    vec![
        EntityDescriptor::new("User")
            .attribute("username", AttributeKind::Text)
            .attribute("password", AttributeKind::Text)
            .nullable_attribute("name", AttributeKind::Text)
            .to_many("posts", "Post")
            .as_user_entity(),
        EntityDescriptor::new("Client")
            .nullable_attribute("name", AttributeKind::Text)
            .attribute("secret", AttributeKind::Text)
            .as_client_entity(),
        EntityDescriptor::new("Session")
            .attribute("token", AttributeKind::Text)
            .nullable_attribute("created", AttributeKind::Date)
            .nullable_attribute("expires", AttributeKind::Date)
            .to_one("user", "User")
            .to_one("client", "Client")
            .as_session_entity(),
        EntityDescriptor::new("Post")
            .attribute("text", AttributeKind::Text)
            .to_one("creator", "User")
            .to_many("likes", "User"),
    ]
}

/// Whether `ctx` is the user a to-one relationship points at.
async fn owns_via(
    store: &dyn DataStore,
    instance: &InstanceRef,
    relationship: &str,
    ctx: &AuthContext,
) -> Result<bool> {
    let Some(user_id) = ctx.user_id() else {
        return Ok(false);
    };
    match store.get_relationship(instance, relationship).await? {
        RelationshipValue::ToOne(target) => Ok(target == Some(user_id)),
        RelationshipValue::ToMany(_) => Ok(false),
    }
}

// =============================================================================
// User
// =============================================================================

/// Anyone may sign up; only the account holder may edit or delete the
/// account. Credentials on a fresh (username-less) instance are writable so
/// signup can set them.
pub struct UserRules;

impl UserRules {
    async fn is_fresh(store: &dyn DataStore, instance: &InstanceRef) -> Result<bool> {
        Ok(store.get_attribute(instance, "username").await?.is_null())
    }
}

#[async_trait]
impl ResourceCapability for UserRules {
    async fn can_perform(
        &self,
        action: Action<'_>,
        ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<bool> {
        Ok(match action {
            Action::Create => true,
            Action::Delete(instance) => ctx.user_id() == Some(instance.id),
            Action::CallFunction(..) => false,
        })
    }

    async fn field_access(
        &self,
        instance: &InstanceRef,
        field: &str,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FieldAccess> {
        let owner = ctx.user_id() == Some(instance.id);
        Ok(match field {
            "password" => {
                if owner || Self::is_fresh(store, instance).await? {
                    FieldAccess::ReadWrite
                } else {
                    FieldAccess::None
                }
            }
            "username" => {
                if owner || Self::is_fresh(store, instance).await? {
                    FieldAccess::ReadWrite
                } else {
                    FieldAccess::Read
                }
            }
            "name" => {
                if owner {
                    FieldAccess::ReadWrite
                } else {
                    FieldAccess::Read
                }
            }
            "posts" => FieldAccess::Read,
            _ => FieldAccess::None,
        })
    }

    async fn handle_function(
        &self,
        _instance: &InstanceRef,
        name: &str,
        _payload: Option<Value>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FunctionOutcome> {
        Err(anyhow::anyhow!("no function named '{}'", name))
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client records are managed out of band; the API only ever shows their
/// name. The secret never crosses the wire in either direction.
pub struct ClientRules;

#[async_trait]
impl ResourceCapability for ClientRules {
    async fn can_perform(
        &self,
        _action: Action<'_>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn field_access(
        &self,
        _instance: &InstanceRef,
        field: &str,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FieldAccess> {
        Ok(match field {
            "name" => FieldAccess::Read,
            _ => FieldAccess::None,
        })
    }

    async fn handle_function(
        &self,
        _instance: &InstanceRef,
        name: &str,
        _payload: Option<Value>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FunctionOutcome> {
        Err(anyhow::anyhow!("no function named '{}'", name))
    }
}

// =============================================================================
// Session
// =============================================================================

/// Sessions are created only through login and visible only to their user.
/// The token itself is never rendered back.
pub struct SessionRules;

#[async_trait]
impl ResourceCapability for SessionRules {
    async fn can_perform(
        &self,
        action: Action<'_>,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<bool> {
        Ok(match action {
            Action::Create => false,
            Action::Delete(instance) => owns_via(store, instance, "user", ctx).await?,
            Action::CallFunction(..) => false,
        })
    }

    async fn field_access(
        &self,
        instance: &InstanceRef,
        field: &str,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FieldAccess> {
        if field == "token" {
            return Ok(FieldAccess::None);
        }
        if owns_via(store, instance, "user", ctx).await? {
            Ok(FieldAccess::Read)
        } else {
            Ok(FieldAccess::None)
        }
    }

    async fn handle_function(
        &self,
        _instance: &InstanceRef,
        name: &str,
        _payload: Option<Value>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FunctionOutcome> {
        Err(anyhow::anyhow!("no function named '{}'", name))
    }
}

// =============================================================================
// Post
// =============================================================================

/// Posts are world-readable. The creator edits the text; everyone logged in
/// may `like`. The likes list only changes through the function.
pub struct PostRules;

#[async_trait]
impl ResourceCapability for PostRules {
    async fn can_perform(
        &self,
        action: Action<'_>,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<bool> {
        Ok(match action {
            Action::Create => ctx.is_authenticated(),
            Action::Delete(instance) => owns_via(store, instance, "creator", ctx).await?,
            Action::CallFunction(_, "like") => ctx.is_authenticated(),
            Action::CallFunction(..) => false,
        })
    }

    async fn field_access(
        &self,
        instance: &InstanceRef,
        field: &str,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FieldAccess> {
        // A fresh post has no creator yet; the authenticated caller who is
        // populating it gets write access until the creator is bound.
        let unset = matches!(
            store.get_relationship(instance, "creator").await?,
            RelationshipValue::ToOne(None)
        );
        let editable =
            (unset && ctx.is_authenticated()) || owns_via(store, instance, "creator", ctx).await?;

        Ok(match field {
            "text" => {
                if editable {
                    FieldAccess::ReadWrite
                } else {
                    FieldAccess::Read
                }
            }
            "creator" => {
                if unset && ctx.is_authenticated() {
                    FieldAccess::ReadWrite
                } else {
                    FieldAccess::Read
                }
            }
            "likes" => FieldAccess::Read,
            _ => FieldAccess::None,
        })
    }

    async fn handle_function(
        &self,
        instance: &InstanceRef,
        name: &str,
        _payload: Option<Value>,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FunctionOutcome> {
        match name {
            "like" => {
                let Some(user_id) = ctx.user_id() else {
                    return Err(anyhow::anyhow!("like requires an authenticated session"));
                };
                let RelationshipValue::ToMany(mut likes) =
                    store.get_relationship(instance, "likes").await?
                else {
                    return Err(anyhow::anyhow!("likes is not a to-many relationship"));
                };
                if !likes.contains(&user_id) {
                    likes.push(user_id);
                }
                let count = likes.len();
                store
                    .set_relationship(instance, "likes", RelationshipValue::ToMany(likes))
                    .await?;
                Ok(FunctionOutcome::ok(json!({ "likes": count })))
            }
            other => Err(anyhow::anyhow!("no function named '{}'", other)),
        }
    }

    fn function_names(&self) -> &[&str] {
        &["like"]
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A dispatcher over a seedable in-memory store.
pub struct TestHarness {
    pub store: Arc<InMemoryDataStore>,
    pub dispatcher: Arc<Dispatcher>,
}

pub fn harness() -> TestHarness {
    harness_with_config(ServerConfig::default())
}

pub fn harness_with_config(config: ServerConfig) -> TestHarness {
    let store = Arc::new(InMemoryDataStore::new(social_schema()));
    let dispatcher = ServerBuilder::new()
        .with_store(store.as_ref().clone())
        .with_config(config)
        .register_capability("User", UserRules)
        .register_capability("Client", ClientRules)
        .register_capability("Session", SessionRules)
        .register_capability("Post", PostRules)
        .build()
        .expect("fixture schema must build");
    TestHarness {
        store,
        dispatcher: Arc::new(dispatcher),
    }
}

impl TestHarness {
    pub async fn seed_client(&self, secret: &str) -> ResourceId {
        let client = self.store.create("Client").await.unwrap();
        self.store
            .set_attribute(&client, "secret", AttributeValue::Text(secret.into()))
            .await
            .unwrap();
        client.id
    }

    pub async fn seed_user(&self, username: &str, password: &str) -> ResourceId {
        let user = self.store.create("User").await.unwrap();
        self.store
            .set_attribute(&user, "username", AttributeValue::Text(username.into()))
            .await
            .unwrap();
        self.store
            .set_attribute(&user, "password", AttributeValue::Text(password.into()))
            .await
            .unwrap();
        user.id
    }

    pub async fn seed_post(&self, text: &str, creator: ResourceId) -> ResourceId {
        let post = self.store.create("Post").await.unwrap();
        self.store
            .set_attribute(&post, "text", AttributeValue::Text(text.into()))
            .await
            .unwrap();
        self.store
            .set_relationship(&post, "creator", RelationshipValue::ToOne(Some(creator)))
            .await
            .unwrap();
        post.id
    }

    /// Log in over the dispatcher and return the issued token.
    pub async fn login(
        &self,
        client_id: ResourceId,
        secret: &str,
        username: &str,
        password: &str,
    ) -> String {
        let response = self
            .dispatcher
            .handle(
                ApiRequest::new(axum::http::Method::POST, "/login").with_json(&json!({
                    "clientID": client_id,
                    "clientSecret": secret,
                    "username": username,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "fixture login must succeed");
        response.body.unwrap()["token"].as_str().unwrap().to_string()
    }
}
