//! ServerBuilder for fluent construction of a dispatcher
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = ServerBuilder::new()
//!     .with_store(InMemoryDataStore::new(schema))
//!     .with_config(ServerConfig::default())
//!     .register_capability("User", UserRules)
//!     .register_capability("Post", PostRules)
//!     .build()?;
//! ```

use crate::config::ServerConfig;
use crate::core::resource::ResourceCapability;
use crate::core::store::DataStore;
use crate::server::dispatcher::Dispatcher;
use crate::server::exposure::RestExposure;
use crate::server::registry::SchemaRegistry;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder that assembles the registry and dispatcher from a store, a
/// configuration, and one capability per entity.
pub struct ServerBuilder {
    store: Option<Arc<dyn DataStore>>,
    config: ServerConfig,
    capabilities: HashMap<String, Arc<dyn ResourceCapability>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            config: ServerConfig::default(),
            capabilities: HashMap::new(),
        }
    }

    /// Set the data store (required)
    pub fn with_store(mut self, store: impl DataStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the server configuration
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a capability to an entity type.
    ///
    /// Every entity in the store's schema needs exactly one; building fails
    /// otherwise.
    pub fn register_capability(
        mut self,
        entity: impl Into<String>,
        capability: impl ResourceCapability + 'static,
    ) -> Self {
        self.capabilities.insert(entity.into(), Arc::new(capability));
        self
    }

    /// Validate the schema and assemble the dispatcher.
    pub fn build(self) -> Result<Dispatcher> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("DataStore is required. Call .with_store()"))?;
        let registry =
            SchemaRegistry::build(store.schema(), self.capabilities, &self.config.login_path)?;
        Ok(Dispatcher::new(store, registry, self.config))
    }

    /// Build and serve over HTTP with graceful shutdown.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let dispatcher = Arc::new(self.build()?);
        RestExposure::serve(dispatcher, addr).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
