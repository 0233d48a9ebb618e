//! Session issuance, lookup, and revocation
//!
//! Sessions are ordinary resource instances of the schema's session entity,
//! persisted through the data store like everything else. The manager owns
//! their lifecycle: it is the only component that creates or deletes them.

use crate::core::error::{AuthError, ServerResult};
use crate::core::session::{Session, generate_token};
use crate::core::store::{DataStore, InstanceRef, RelationshipValue, ResourceId};
use crate::core::value::AttributeValue;
use crate::server::registry::{SchemaRegistry, role_fields};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Issues, looks up, and revokes sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn DataStore>,
    registry: Arc<SchemaRegistry>,
    ttl: Option<Duration>,
    stamp_created: bool,
    stamp_expires: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn DataStore>,
        registry: Arc<SchemaRegistry>,
        ttl: Option<Duration>,
    ) -> Self {
        // Timestamp attributes are optional in the session schema; probe
        // once so request handling never re-checks.
        let descriptor = registry.entity(registry.session_entity());
        let stamp_created = descriptor
            .is_some_and(|d| d.attribute_named(role_fields::SESSION_CREATED).is_some());
        let stamp_expires = descriptor
            .is_some_and(|d| d.attribute_named(role_fields::SESSION_EXPIRES).is_some());

        Self {
            store,
            registry,
            ttl,
            stamp_created,
            stamp_expires,
        }
    }

    /// Verify client and user credentials and issue a new session.
    ///
    /// Any mismatch, including an unknown client id or username, fails with
    /// the same [`AuthError::LoginFailed`] so the response never reveals
    /// which credential was wrong. No session instance exists after a
    /// failed login.
    pub async fn login(
        &self,
        client_id: ResourceId,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> ServerResult<Session> {
        let client_entity = self.registry.client_entity();
        let user_entity = self.registry.user_entity();

        let Some(client) = self.store.fetch(client_entity, client_id).await? else {
            return Err(AuthError::LoginFailed.into());
        };
        let stored_secret = self
            .store
            .get_attribute(&client, role_fields::CLIENT_SECRET)
            .await?;
        if stored_secret.as_text() != Some(client_secret) {
            return Err(AuthError::LoginFailed.into());
        }

        let candidates = self
            .store
            .search(
                user_entity,
                role_fields::USER_USERNAME,
                &AttributeValue::Text(username.to_string()),
            )
            .await?;
        let Some(&user_id) = candidates.first() else {
            return Err(AuthError::LoginFailed.into());
        };
        let user = InstanceRef::new(user_entity, user_id);
        let stored_password = self
            .store
            .get_attribute(&user, role_fields::USER_PASSWORD)
            .await?;
        if stored_password.as_text() != Some(password) {
            return Err(AuthError::LoginFailed.into());
        }

        self.create_session(user_id, client_id).await
    }

    /// Exact-match session lookup.
    ///
    /// Unknown and expired tokens both resolve to `Ok(None)`: the request
    /// proceeds anonymously rather than failing.
    pub async fn session_for_token(&self, token: &str) -> ServerResult<Option<Session>> {
        let session_entity = self.registry.session_entity();
        let ids = self
            .store
            .search(
                session_entity,
                role_fields::SESSION_TOKEN,
                &AttributeValue::Text(token.to_string()),
            )
            .await?;
        let Some(&id) = ids.first() else {
            return Ok(None);
        };
        let Some(session) = self.load(id).await? else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Revoke the session carrying `token`. Returns whether one existed.
    pub async fn revoke(&self, token: &str) -> ServerResult<bool> {
        let session_entity = self.registry.session_entity();
        let ids = self
            .store
            .search(
                session_entity,
                role_fields::SESSION_TOKEN,
                &AttributeValue::Text(token.to_string()),
            )
            .await?;
        let Some(&id) = ids.first() else {
            return Ok(false);
        };
        self.store
            .delete(&InstanceRef::new(session_entity, id))
            .await?;
        Ok(true)
    }

    async fn create_session(
        &self,
        user_id: ResourceId,
        client_id: ResourceId,
    ) -> ServerResult<Session> {
        let session_entity = self.registry.session_entity();
        let token = self.unique_token(session_entity).await?;
        let created = Utc::now();
        let expires = self.ttl.map(|ttl| created + ttl);

        let instance = self.store.create(session_entity).await?;
        match self
            .populate_session(&instance, &token, user_id, client_id, created, expires)
            .await
        {
            Ok(()) => Ok(Session {
                id: instance.id,
                token,
                user_id,
                client_id,
                created,
                expires,
            }),
            Err(err) => {
                // A half-written session must not be honorable as a credential.
                if let Err(cleanup) = self.store.delete(&instance).await {
                    tracing::error!(
                        entity = session_entity,
                        id = instance.id,
                        error = %cleanup,
                        "failed to roll back partially created session"
                    );
                }
                Err(err)
            }
        }
    }

    async fn populate_session(
        &self,
        instance: &InstanceRef,
        token: &str,
        user_id: ResourceId,
        client_id: ResourceId,
        created: DateTime<Utc>,
        expires: Option<DateTime<Utc>>,
    ) -> ServerResult<()> {
        self.store
            .set_attribute(
                instance,
                role_fields::SESSION_TOKEN,
                AttributeValue::Text(token.to_string()),
            )
            .await?;
        self.store
            .set_relationship(
                instance,
                role_fields::SESSION_USER,
                RelationshipValue::ToOne(Some(user_id)),
            )
            .await?;
        self.store
            .set_relationship(
                instance,
                role_fields::SESSION_CLIENT,
                RelationshipValue::ToOne(Some(client_id)),
            )
            .await?;

        if self.stamp_created {
            self.store
                .set_attribute(
                    instance,
                    role_fields::SESSION_CREATED,
                    AttributeValue::Date(created),
                )
                .await?;
        }
        if self.stamp_expires {
            let value = match expires {
                Some(at) => AttributeValue::Date(at),
                None => AttributeValue::Null,
            };
            self.store
                .set_attribute(instance, role_fields::SESSION_EXPIRES, value)
                .await?;
        }
        Ok(())
    }

    async fn unique_token(&self, session_entity: &str) -> ServerResult<String> {
        loop {
            let token = generate_token();
            let existing = self
                .store
                .search(
                    session_entity,
                    role_fields::SESSION_TOKEN,
                    &AttributeValue::Text(token.clone()),
                )
                .await?;
            if existing.is_empty() {
                return Ok(token);
            }
        }
    }

    async fn load(&self, id: ResourceId) -> ServerResult<Option<Session>> {
        let session_entity = self.registry.session_entity();
        let instance = InstanceRef::new(session_entity, id);

        let token = self
            .store
            .get_attribute(&instance, role_fields::SESSION_TOKEN)
            .await?;
        let Some(token) = token.as_text().map(|t| t.to_string()) else {
            return Ok(None);
        };

        let user = self
            .store
            .get_relationship(&instance, role_fields::SESSION_USER)
            .await?;
        let client = self
            .store
            .get_relationship(&instance, role_fields::SESSION_CLIENT)
            .await?;
        let (RelationshipValue::ToOne(Some(user_id)), RelationshipValue::ToOne(Some(client_id))) =
            (user, client)
        else {
            // A session not bound to both identities is not a credential.
            return Ok(None);
        };

        let created = if self.stamp_created {
            match self
                .store
                .get_attribute(&instance, role_fields::SESSION_CREATED)
                .await?
            {
                AttributeValue::Date(at) => at,
                _ => Utc::now(),
            }
        } else {
            Utc::now()
        };
        let expires = if self.stamp_expires {
            match self
                .store
                .get_attribute(&instance, role_fields::SESSION_EXPIRES)
                .await?
            {
                AttributeValue::Date(at) => Some(at),
                _ => None,
            }
        } else {
            None
        };

        Ok(Some(Session {
            id,
            token,
            user_id,
            client_id,
            created,
            expires,
        }))
    }
}
