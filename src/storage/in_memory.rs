//! In-memory implementation of DataStore for testing and development

use crate::core::schema::{Cardinality, EntityDescriptor};
use crate::core::store::{DataStore, InstanceRef, RelationshipValue, ResourceId};
use crate::core::value::AttributeValue;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
struct Row {
    attributes: HashMap<String, AttributeValue>,
    relationships: HashMap<String, RelationshipValue>,
}

#[derive(Debug, Default)]
struct EntityTable {
    next_id: ResourceId,
    rows: HashMap<ResourceId, Row>,
}

/// In-memory data store implementation
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// concurrent writers to the same instance resolve last-writer-wins.
#[derive(Clone)]
pub struct InMemoryDataStore {
    schema: Vec<EntityDescriptor>,
    tables: Arc<RwLock<HashMap<String, EntityTable>>>,
}

impl InMemoryDataStore {
    /// Create a store exposing the given schema, with one empty table per
    /// entity.
    pub fn new(schema: Vec<EntityDescriptor>) -> Self {
        let tables = schema
            .iter()
            .map(|entity| {
                (
                    entity.name.clone(),
                    EntityTable {
                        next_id: 1,
                        rows: HashMap::new(),
                    },
                )
            })
            .collect();
        Self {
            schema,
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Number of stored instances of an entity.
    pub fn count(&self, entity: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(entity).map(|table| table.rows.len()))
            .unwrap_or(0)
    }

    fn descriptor(&self, entity: &str) -> Result<&EntityDescriptor> {
        self.schema
            .iter()
            .find(|e| e.name == entity)
            .ok_or_else(|| anyhow!("unknown entity type: {}", entity))
    }

    fn default_row(entity: &EntityDescriptor) -> Row {
        let attributes = entity
            .attributes
            .iter()
            .map(|a| (a.name.clone(), AttributeValue::Null))
            .collect();
        let relationships = entity
            .relationships
            .iter()
            .map(|r| {
                let empty = match r.cardinality {
                    Cardinality::ToOne => RelationshipValue::ToOne(None),
                    Cardinality::ToMany => RelationshipValue::ToMany(Vec::new()),
                };
                (r.name.clone(), empty)
            })
            .collect();
        Row {
            attributes,
            relationships,
        }
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    fn schema(&self) -> Vec<EntityDescriptor> {
        self.schema.clone()
    }

    async fn fetch(&self, entity: &str, id: ResourceId) -> Result<Option<InstanceRef>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let table = tables
            .get(entity)
            .ok_or_else(|| anyhow!("unknown entity type: {}", entity))?;
        Ok(table
            .rows
            .contains_key(&id)
            .then(|| InstanceRef::new(entity, id)))
    }

    async fn create(&self, entity: &str) -> Result<InstanceRef> {
        let descriptor = self.descriptor(entity)?;
        let row = Self::default_row(descriptor);

        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| anyhow!("unknown entity type: {}", entity))?;
        let id = table.next_id;
        table.next_id += 1;
        table.rows.insert(id, row);

        Ok(InstanceRef::new(entity, id))
    }

    async fn delete(&self, instance: &InstanceRef) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let table = tables
            .get_mut(&instance.entity)
            .ok_or_else(|| anyhow!("unknown entity type: {}", instance.entity))?;
        table
            .rows
            .remove(&instance.id)
            .ok_or_else(|| anyhow!("{} {} not found", instance.entity, instance.id))?;

        // Scrub dangling references so deleted instances disappear from
        // every relationship that pointed at them.
        for entity in &self.schema {
            for relationship in &entity.relationships {
                if relationship.target != instance.entity {
                    continue;
                }
                if let Some(table) = tables.get_mut(&entity.name) {
                    for row in table.rows.values_mut() {
                        match row.relationships.get_mut(&relationship.name) {
                            Some(RelationshipValue::ToOne(target)) => {
                                if *target == Some(instance.id) {
                                    *target = None;
                                }
                            }
                            Some(RelationshipValue::ToMany(targets)) => {
                                targets.retain(|&id| id != instance.id);
                            }
                            None => {}
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn get_attribute(
        &self,
        instance: &InstanceRef,
        attribute: &str,
    ) -> Result<AttributeValue> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let row = tables
            .get(&instance.entity)
            .and_then(|table| table.rows.get(&instance.id))
            .ok_or_else(|| anyhow!("{} {} not found", instance.entity, instance.id))?;
        row.attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| anyhow!("{} has no attribute '{}'", instance.entity, attribute))
    }

    async fn set_attribute(
        &self,
        instance: &InstanceRef,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let row = tables
            .get_mut(&instance.entity)
            .and_then(|table| table.rows.get_mut(&instance.id))
            .ok_or_else(|| anyhow!("{} {} not found", instance.entity, instance.id))?;
        let slot = row
            .attributes
            .get_mut(attribute)
            .ok_or_else(|| anyhow!("{} has no attribute '{}'", instance.entity, attribute))?;
        *slot = value;
        Ok(())
    }

    async fn get_relationship(
        &self,
        instance: &InstanceRef,
        relationship: &str,
    ) -> Result<RelationshipValue> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let row = tables
            .get(&instance.entity)
            .and_then(|table| table.rows.get(&instance.id))
            .ok_or_else(|| anyhow!("{} {} not found", instance.entity, instance.id))?;
        row.relationships
            .get(relationship)
            .cloned()
            .ok_or_else(|| anyhow!("{} has no relationship '{}'", instance.entity, relationship))
    }

    async fn set_relationship(
        &self,
        instance: &InstanceRef,
        relationship: &str,
        value: RelationshipValue,
    ) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let row = tables
            .get_mut(&instance.entity)
            .and_then(|table| table.rows.get_mut(&instance.id))
            .ok_or_else(|| anyhow!("{} {} not found", instance.entity, instance.id))?;
        let slot = row
            .relationships
            .get_mut(relationship)
            .ok_or_else(|| anyhow!("{} has no relationship '{}'", instance.entity, relationship))?;
        *slot = value;
        Ok(())
    }

    async fn search(
        &self,
        entity: &str,
        attribute: &str,
        value: &AttributeValue,
    ) -> Result<Vec<ResourceId>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let table = tables
            .get(entity)
            .ok_or_else(|| anyhow!("unknown entity type: {}", entity))?;

        let mut matches: Vec<ResourceId> = table
            .rows
            .iter()
            .filter(|(_, row)| row.attributes.get(attribute) == Some(value))
            .map(|(&id, _)| id)
            .collect();
        matches.sort_unstable();
        Ok(matches)
    }
}
