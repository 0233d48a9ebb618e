//! The data store contract the server runs against
//!
//! The server never owns persistence. It consumes this narrow async contract
//! and stays agnostic to the backing storage; anything that can describe a
//! schema and move typed values in and out of numbered instances can sit
//! behind it.

use crate::core::schema::EntityDescriptor;
use crate::core::value::AttributeValue;
use anyhow::Result;
use async_trait::async_trait;

/// Numeric identifier of a resource instance, unique per entity type.
pub type ResourceId = u64;

/// Handle to one resource instance: an (entity name, numeric id) pair.
///
/// Instances are always addressed by this index, never held as in-process
/// object graphs; relationships resolve to ids, not pointers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    pub entity: String,
    pub id: ResourceId,
}

impl InstanceRef {
    pub fn new(entity: impl Into<String>, id: ResourceId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

/// Value of a relationship field, matching its declared cardinality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipValue {
    /// Target id of a to-one relationship, if set
    ToOne(Option<ResourceId>),

    /// Ordered target ids of a to-many relationship
    ToMany(Vec<ResourceId>),
}

/// Async contract for the persistent object store.
///
/// All methods that touch stored state may suspend on I/O; callers must not
/// hold process-wide locks across them. Errors are backend errors; "no such
/// instance" fetch results are `Ok(None)`, not errors.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// The entity schema this store exposes. Called once at startup to build
    /// the registry; the result must be stable for the process lifetime.
    fn schema(&self) -> Vec<EntityDescriptor>;

    /// Resolve an instance by entity name and id.
    async fn fetch(&self, entity: &str, id: ResourceId) -> Result<Option<InstanceRef>>;

    /// Create a new instance of an entity with default field values.
    async fn create(&self, entity: &str) -> Result<InstanceRef>;

    /// Delete an instance.
    async fn delete(&self, instance: &InstanceRef) -> Result<()>;

    /// Read one attribute.
    async fn get_attribute(&self, instance: &InstanceRef, attribute: &str)
    -> Result<AttributeValue>;

    /// Write one attribute.
    async fn set_attribute(
        &self,
        instance: &InstanceRef,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<()>;

    /// Read one relationship.
    async fn get_relationship(
        &self,
        instance: &InstanceRef,
        relationship: &str,
    ) -> Result<RelationshipValue>;

    /// Write one relationship.
    async fn set_relationship(
        &self,
        instance: &InstanceRef,
        relationship: &str,
        value: RelationshipValue,
    ) -> Result<()>;

    /// Find instances whose attribute equals a value.
    ///
    /// This is the only query the server needs: exact-match lookup, used for
    /// session tokens and usernames.
    async fn search(
        &self,
        entity: &str,
        attribute: &str,
        value: &AttributeValue,
    ) -> Result<Vec<ResourceId>>;
}
