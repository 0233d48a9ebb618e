//! Schema registry: derived resource paths and startup invariants
//!
//! Built once from the store's schema before the server accepts a single
//! request, read-only afterwards. Construction is where every "exactly one
//! entity plays this role" and "paths don't collide" rule is enforced, so
//! request handling never has to re-check them.

use crate::core::pluralize::pluralize;
use crate::core::resource::ResourceCapability;
use crate::core::schema::{AttributeKind, Cardinality, EntityDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Attribute names the role entities must declare.
///
/// These are the credential fields the session machinery reads and writes;
/// the registry refuses to build when a role entity is missing one.
pub mod role_fields {
    pub const USER_USERNAME: &str = "username";
    pub const USER_PASSWORD: &str = "password";
    pub const CLIENT_SECRET: &str = "secret";
    pub const SESSION_TOKEN: &str = "token";
    pub const SESSION_USER: &str = "user";
    pub const SESSION_CLIENT: &str = "client";
    pub const SESSION_CREATED: &str = "created";
    pub const SESSION_EXPIRES: &str = "expires";
}

/// Construction-time schema validation failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("expected exactly one {role} entity, found {count}")]
    RoleCardinality { role: &'static str, count: usize },

    #[error("login path '{path}' collides with the resource path of entity '{entity}'")]
    LoginPathCollision { path: String, entity: String },

    #[error("entities '{first}' and '{second}' both derive resource path '{path}'")]
    DuplicatePath {
        first: String,
        second: String,
        path: String,
    },

    #[error("{role} entity '{entity}' is missing required field '{field}'")]
    MissingRoleField {
        role: &'static str,
        entity: String,
        field: &'static str,
    },

    #[error("relationship '{relationship}' on '{entity}' targets unknown entity '{target}'")]
    UnknownRelationshipTarget {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("capability registered for unknown entity '{entity}'")]
    UnknownCapabilityEntity { entity: String },

    #[error("no capability registered for entity '{entity}'")]
    MissingCapability { entity: String },
}

/// The registry: entity descriptors, their derived URL paths, their bound
/// capabilities, and the three role entities.
pub struct SchemaRegistry {
    entities: Vec<EntityDescriptor>,
    index_by_name: HashMap<String, usize>,
    index_by_path: HashMap<String, usize>,
    path_by_name: HashMap<String, String>,
    capabilities: HashMap<String, Arc<dyn ResourceCapability>>,
    session_entity: String,
    user_entity: String,
    client_entity: String,
    login_path: String,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entities", &self.entities)
            .field("index_by_name", &self.index_by_name)
            .field("index_by_path", &self.index_by_path)
            .field("path_by_name", &self.path_by_name)
            .field("capabilities", &self.capabilities.keys().collect::<Vec<_>>())
            .field("session_entity", &self.session_entity)
            .field("user_entity", &self.user_entity)
            .field("client_entity", &self.client_entity)
            .field("login_path", &self.login_path)
            .finish()
    }
}

impl SchemaRegistry {
    /// Derive the resource path segment for an entity name.
    pub fn derive_path(entity_name: &str) -> String {
        pluralize(&entity_name.to_lowercase())
    }

    /// Build and validate a registry.
    ///
    /// `login_path` is the configured authentication path ("/login"); it is
    /// normalized and checked against every derived resource path.
    pub fn build(
        schema: Vec<EntityDescriptor>,
        capabilities: HashMap<String, Arc<dyn ResourceCapability>>,
        login_path: &str,
    ) -> Result<Self, RegistryError> {
        let login_path = login_path.trim_matches('/').to_string();

        let mut index_by_name = HashMap::new();
        let mut index_by_path: HashMap<String, usize> = HashMap::new();
        let mut path_by_name = HashMap::new();

        for (index, entity) in schema.iter().enumerate() {
            let path = Self::derive_path(&entity.name);

            if path == login_path {
                return Err(RegistryError::LoginPathCollision {
                    path: login_path,
                    entity: entity.name.clone(),
                });
            }
            if let Some(&existing) = index_by_path.get(&path) {
                return Err(RegistryError::DuplicatePath {
                    first: schema[existing].name.clone(),
                    second: entity.name.clone(),
                    path,
                });
            }

            index_by_name.insert(entity.name.clone(), index);
            index_by_path.insert(path.clone(), index);
            path_by_name.insert(entity.name.clone(), path);
        }

        let session_entity = Self::single_role(&schema, "session", |e| e.is_session_entity)?;
        let user_entity = Self::single_role(&schema, "user", |e| e.is_user_entity)?;
        let client_entity = Self::single_role(&schema, "client", |e| e.is_client_entity)?;

        Self::check_role_fields(&schema, &index_by_name, &session_entity, &user_entity, &client_entity)?;

        for entity in &schema {
            for relationship in &entity.relationships {
                if !index_by_name.contains_key(&relationship.target) {
                    return Err(RegistryError::UnknownRelationshipTarget {
                        entity: entity.name.clone(),
                        relationship: relationship.name.clone(),
                        target: relationship.target.clone(),
                    });
                }
            }
        }

        for name in capabilities.keys() {
            if !index_by_name.contains_key(name) {
                return Err(RegistryError::UnknownCapabilityEntity {
                    entity: name.clone(),
                });
            }
        }
        for entity in &schema {
            if !capabilities.contains_key(&entity.name) {
                return Err(RegistryError::MissingCapability {
                    entity: entity.name.clone(),
                });
            }
        }

        Ok(Self {
            entities: schema,
            index_by_name,
            index_by_path,
            path_by_name,
            capabilities,
            session_entity,
            user_entity,
            client_entity,
            login_path,
        })
    }

    fn single_role(
        schema: &[EntityDescriptor],
        role: &'static str,
        flag: impl Fn(&EntityDescriptor) -> bool,
    ) -> Result<String, RegistryError> {
        let matches: Vec<&EntityDescriptor> = schema.iter().filter(|e| flag(e)).collect();
        match matches.as_slice() {
            [only] => Ok(only.name.clone()),
            _ => Err(RegistryError::RoleCardinality {
                role,
                count: matches.len(),
            }),
        }
    }

    fn require_text_attr(
        schema: &[EntityDescriptor],
        index_by_name: &HashMap<String, usize>,
        entity_name: &str,
        role: &'static str,
        field: &'static str,
    ) -> Result<(), RegistryError> {
        let found = schema[index_by_name[entity_name]]
            .attribute_named(field)
            .is_some_and(|a| a.kind == AttributeKind::Text);
        if found {
            Ok(())
        } else {
            Err(RegistryError::MissingRoleField {
                role,
                entity: entity_name.to_string(),
                field,
            })
        }
    }

    fn check_role_fields(
        schema: &[EntityDescriptor],
        index_by_name: &HashMap<String, usize>,
        session_entity: &str,
        user_entity: &str,
        client_entity: &str,
    ) -> Result<(), RegistryError> {
        Self::require_text_attr(schema, index_by_name, user_entity, "user", role_fields::USER_USERNAME)?;
        Self::require_text_attr(schema, index_by_name, user_entity, "user", role_fields::USER_PASSWORD)?;
        Self::require_text_attr(
            schema,
            index_by_name,
            client_entity,
            "client",
            role_fields::CLIENT_SECRET,
        )?;
        Self::require_text_attr(
            schema,
            index_by_name,
            session_entity,
            "session",
            role_fields::SESSION_TOKEN,
        )?;

        let session = &schema[index_by_name[session_entity]];
        for (field, target) in [
            (role_fields::SESSION_USER, user_entity),
            (role_fields::SESSION_CLIENT, client_entity),
        ] {
            let found = session
                .relationship_named(field)
                .is_some_and(|r| r.cardinality == Cardinality::ToOne && r.target == target);
            if !found {
                return Err(RegistryError::MissingRoleField {
                    role: "session",
                    entity: session_entity.to_string(),
                    field,
                });
            }
        }

        Ok(())
    }

    /// The derived resource path for an entity name
    pub fn path_for(&self, entity_name: &str) -> Option<&str> {
        self.path_by_name.get(entity_name).map(|s| s.as_str())
    }

    /// The entity whose derived path matches `path`
    pub fn entity_for_path(&self, path: &str) -> Option<&EntityDescriptor> {
        self.index_by_path.get(path).map(|&i| &self.entities[i])
    }

    /// Look up an entity descriptor by name
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.index_by_name.get(name).map(|&i| &self.entities[i])
    }

    /// The capability bound to an entity
    pub fn capability_for(&self, entity_name: &str) -> Option<&Arc<dyn ResourceCapability>> {
        self.capabilities.get(entity_name)
    }

    /// All registered entities, in schema order
    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    /// Name of the session entity
    pub fn session_entity(&self) -> &str {
        &self.session_entity
    }

    /// Name of the user entity
    pub fn user_entity(&self) -> &str {
        &self.user_entity
    }

    /// Name of the client entity
    pub fn client_entity(&self) -> &str {
        &self.client_entity
    }

    /// The normalized login path (no surrounding slashes)
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}
