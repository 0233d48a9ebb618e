//! JSON projection: permission-filtered rendering and edit validation
//!
//! Rendering walks the schema, not the payload, so the wire representation
//! always follows declared field order and a caller can never probe for
//! fields they cannot see: an invisible field is omitted, not nulled.
//!
//! Edits are all-or-nothing. Shape validation runs over the whole payload
//! first, then permission validation; `apply_edit` only runs once both
//! passes are clean, so a rejected edit mutates nothing.

use crate::core::error::{AuthError, ProtocolError, ServerResult};
use crate::core::resource::FieldAccess;
use crate::core::schema::{AttributeKind, Cardinality, EntityDescriptor};
use crate::core::session::AuthContext;
use crate::core::store::{DataStore, InstanceRef, RelationshipValue, ResourceId};
use crate::core::value::AttributeValue;
use crate::server::access::AccessEngine;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Renders instances to JSON and validates/applies partial updates.
#[derive(Clone)]
pub struct Projector {
    store: Arc<dyn DataStore>,
    access: AccessEngine,
}

impl Projector {
    pub fn new(store: Arc<dyn DataStore>, access: AccessEngine) -> Self {
        Self { store, access }
    }

    /// Render `instance` for `ctx` as a JSON object.
    ///
    /// Fields below [`FieldAccess::Read`] are omitted entirely. Attribute
    /// values become JSON scalars; opaque attributes are skipped. To-one
    /// relationships render as the target id or null, to-many as the
    /// ordered id array. An instance with nothing visible renders as `{}`.
    pub async fn render(
        &self,
        entity: &EntityDescriptor,
        instance: &InstanceRef,
        ctx: &AuthContext,
    ) -> ServerResult<Map<String, Value>> {
        let mut rendered = Map::new();

        for attribute in &entity.attributes {
            if attribute.kind == AttributeKind::Opaque {
                continue;
            }
            let access = self.access.field_access(ctx, instance, &attribute.name).await;
            if access < FieldAccess::Read {
                continue;
            }
            let value = self.store.get_attribute(instance, &attribute.name).await?;
            rendered.insert(attribute.name.clone(), value.to_json());
        }

        for relationship in &entity.relationships {
            let access = self
                .access
                .field_access(ctx, instance, &relationship.name)
                .await;
            if access < FieldAccess::Read {
                continue;
            }
            let value = self
                .store
                .get_relationship(instance, &relationship.name)
                .await?;
            let json = match value {
                RelationshipValue::ToOne(Some(id)) => Value::Number(id.into()),
                RelationshipValue::ToOne(None) => Value::Null,
                RelationshipValue::ToMany(ids) => {
                    Value::Array(ids.into_iter().map(|id| Value::Number(id.into())).collect())
                }
            };
            rendered.insert(relationship.name.clone(), json);
        }

        Ok(rendered)
    }

    /// Validate an edit payload's shape against the schema.
    ///
    /// Every key must name a declared, non-opaque field and carry a value
    /// matching its type, nullability, format, and cardinality. Runs before
    /// any permission is consulted.
    pub fn verify_shape(
        &self,
        entity: &EntityDescriptor,
        payload: &Map<String, Value>,
    ) -> ServerResult<()> {
        for (field, value) in payload {
            if let Some(attribute) = entity.attribute_named(field) {
                if attribute.kind == AttributeKind::Opaque {
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: "attribute is not editable over the wire".to_string(),
                    }
                    .into());
                }
                let Some(parsed) = AttributeValue::from_json(value, attribute.kind) else {
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: format!("expected a {:?} value", attribute.kind),
                    }
                    .into());
                };
                if parsed.is_null() && !attribute.nullable {
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: "attribute is not nullable".to_string(),
                    }
                    .into());
                }
                if let (Some(format), Some(text)) = (&attribute.format, parsed.as_text()) {
                    if !format.validate(text) {
                        return Err(ProtocolError::ValueMismatch {
                            field: field.clone(),
                            message: "value does not match the required format".to_string(),
                        }
                        .into());
                    }
                }
            } else if let Some(relationship) = entity.relationship_named(field) {
                if Self::parse_relationship(value, relationship.cardinality).is_none() {
                    let expected = match relationship.cardinality {
                        Cardinality::ToOne => "a numeric id or null",
                        Cardinality::ToMany => "an array of numeric ids",
                    };
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: format!("expected {}", expected),
                    }
                    .into());
                }
            } else {
                return Err(ProtocolError::UnknownField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate that `ctx` may write every field the payload touches.
    pub async fn verify_access(
        &self,
        instance: &InstanceRef,
        payload: &Map<String, Value>,
        ctx: &AuthContext,
    ) -> ServerResult<()> {
        for field in payload.keys() {
            let access = self.access.field_access(ctx, instance, field).await;
            if access < FieldAccess::ReadWrite {
                return Err(AuthError::Forbidden {
                    action: format!("write field '{}'", field),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Full edit validation: shape first, permissions second.
    pub async fn verify_edit(
        &self,
        entity: &EntityDescriptor,
        instance: &InstanceRef,
        payload: &Map<String, Value>,
        ctx: &AuthContext,
    ) -> ServerResult<()> {
        self.verify_shape(entity, payload)?;
        self.verify_access(instance, payload, ctx).await
    }

    /// Write a verified payload through the store's typed setters.
    ///
    /// Must only be called after [`verify_edit`](Self::verify_edit) (or the
    /// shape/access pair) succeeded, with the caller holding the instance's
    /// write lock.
    pub async fn apply_edit(
        &self,
        entity: &EntityDescriptor,
        instance: &InstanceRef,
        payload: &Map<String, Value>,
    ) -> ServerResult<()> {
        for (field, value) in payload {
            if let Some(attribute) = entity.attribute_named(field) {
                let Some(parsed) = AttributeValue::from_json(value, attribute.kind) else {
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: format!("expected a {:?} value", attribute.kind),
                    }
                    .into());
                };
                self.store.set_attribute(instance, field, parsed).await?;
            } else if let Some(relationship) = entity.relationship_named(field) {
                let Some(parsed) = Self::parse_relationship(value, relationship.cardinality) else {
                    return Err(ProtocolError::ValueMismatch {
                        field: field.clone(),
                        message: "relationship value changed shape".to_string(),
                    }
                    .into());
                };
                self.store.set_relationship(instance, field, parsed).await?;
            } else {
                return Err(ProtocolError::UnknownField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn parse_relationship(value: &Value, cardinality: Cardinality) -> Option<RelationshipValue> {
        match cardinality {
            Cardinality::ToOne => match value {
                Value::Null => Some(RelationshipValue::ToOne(None)),
                Value::Number(n) => n.as_u64().map(|id| RelationshipValue::ToOne(Some(id))),
                _ => None,
            },
            Cardinality::ToMany => {
                let items = value.as_array()?;
                let ids: Option<Vec<ResourceId>> =
                    items.iter().map(|item| item.as_u64()).collect();
                ids.map(RelationshipValue::ToMany)
            }
        }
    }
}
