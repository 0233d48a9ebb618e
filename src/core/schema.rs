//! Schema descriptors for the entity types a store exposes
//!
//! The server never hard-codes a resource type: everything it knows about an
//! entity (its attributes, its relationships, which role it plays) comes from
//! these descriptors, handed over by the data store at startup.

use crate::core::value::FieldFormat;

/// Primitive storage type of an attribute.
///
/// `Opaque` covers attribute types that have no JSON-compatible scalar
/// representation. Opaque attributes are never rendered and never editable
/// over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Boolean,
    Integer,
    Float,
    Text,
    Date,
    Opaque,
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A single typed attribute of an entity.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    /// Attribute name, unique within the entity
    pub name: String,

    /// Primitive storage type
    pub kind: AttributeKind,

    /// Whether the attribute accepts explicit null values
    pub nullable: bool,

    /// Optional format constraint applied to incoming text values
    pub format: Option<FieldFormat>,
}

/// A named relationship from one entity to another.
#[derive(Debug, Clone)]
pub struct RelationshipDescriptor {
    /// Relationship name, unique within the entity
    pub name: String,

    /// Name of the target entity
    pub target: String,

    /// To-one or to-many
    pub cardinality: Cardinality,
}

/// Complete description of one entity type.
///
/// Field declaration order is preserved: rendering iterates attributes and
/// relationships in the order they were declared.
///
/// The three role flags mark the entity types the authentication machinery
/// relies on. A valid schema contains exactly one entity per role.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub relationships: Vec<RelationshipDescriptor>,
    pub is_session_entity: bool,
    pub is_user_entity: bool,
    pub is_client_entity: bool,
}

impl EntityDescriptor {
    /// Create a descriptor with no fields and no role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            is_session_entity: false,
            is_user_entity: false,
            is_client_entity: false,
        }
    }

    /// Declare a non-nullable attribute.
    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            kind,
            nullable: false,
            format: None,
        });
        self
    }

    /// Declare a nullable attribute.
    pub fn nullable_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            kind,
            nullable: true,
            format: None,
        });
        self
    }

    /// Attach a format constraint to the most recently declared attribute.
    ///
    /// No-op when no attribute has been declared yet.
    pub fn with_format(mut self, format: FieldFormat) -> Self {
        if let Some(attr) = self.attributes.last_mut() {
            attr.format = Some(format);
        }
        self
    }

    /// Declare a to-one relationship.
    pub fn to_one(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationships.push(RelationshipDescriptor {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToOne,
        });
        self
    }

    /// Declare a to-many relationship.
    pub fn to_many(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationships.push(RelationshipDescriptor {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToMany,
        });
        self
    }

    /// Mark this entity as the session entity.
    pub fn as_session_entity(mut self) -> Self {
        self.is_session_entity = true;
        self
    }

    /// Mark this entity as the user entity.
    pub fn as_user_entity(mut self) -> Self {
        self.is_user_entity = true;
        self
    }

    /// Mark this entity as the client entity.
    pub fn as_client_entity(mut self) -> Self {
        self.is_client_entity = true;
        self
    }

    /// Look up an attribute by name.
    pub fn attribute_named(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up a relationship by name.
    pub fn relationship_named(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Whether `name` is a declared attribute or relationship.
    pub fn has_field(&self, name: &str) -> bool {
        self.attribute_named(name).is_some() || self.relationship_named(name).is_some()
    }
}
