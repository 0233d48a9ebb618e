//! # gatekit
//!
//! A schema-driven REST server with per-session authentication and
//! field-level authorization.
//!
//! ## Features
//!
//! - **Schema-Derived Routing**: CRUD and function routes come from the
//!   store's entity schema, never from hand-written route tables
//! - **Session Authentication**: client + user credential login issuing
//!   opaque high-entropy tokens, persisted through the same store
//! - **Field-Level Authorization**: every read is filtered and every write
//!   validated per attribute and per relationship, recomputed each request
//! - **Capability Interface**: each entity type supplies its own permission
//!   predicates and functions; the pipeline stays entity-agnostic
//! - **Pluggable Storage**: anything implementing the `DataStore` contract
//!   serves as the backing store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatekit::prelude::*;
//!
//! let schema = vec![
//!     EntityDescriptor::new("User")
//!         .attribute("username", AttributeKind::Text)
//!         .attribute("password", AttributeKind::Text)
//!         .as_user_entity(),
//!     EntityDescriptor::new("Client")
//!         .attribute("secret", AttributeKind::Text)
//!         .as_client_entity(),
//!     EntityDescriptor::new("Session")
//!         .attribute("token", AttributeKind::Text)
//!         .to_one("user", "User")
//!         .to_one("client", "Client")
//!         .as_session_entity(),
//!     EntityDescriptor::new("Post")
//!         .attribute("text", AttributeKind::Text)
//!         .to_one("creator", "User"),
//! ];
//!
//! ServerBuilder::new()
//!     .with_store(InMemoryDataStore::new(schema))
//!     .register_capability("User", UserRules)
//!     .register_capability("Client", ClientRules)
//!     .register_capability("Session", SessionRules)
//!     .register_capability("Post", PostRules)
//!     .serve("127.0.0.1:3000")
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        error::{AuthError, ProtocolError, ServerError, ServerResult, StoreError},
        resource::{Action, FieldAccess, FunctionOutcome, OpenAccess, ResourceCapability},
        schema::{
            AttributeDescriptor, AttributeKind, Cardinality, EntityDescriptor,
            RelationshipDescriptor,
        },
        session::{AuthContext, Session},
        store::{DataStore, InstanceRef, RelationshipValue, ResourceId},
        value::{AttributeValue, FieldFormat},
    };

    // === Config ===
    pub use crate::config::ServerConfig;

    // === Server ===
    pub use crate::server::{
        ApiRequest, ApiResponse, Dispatcher, RestExposure, SchemaRegistry, ServerBuilder,
    };

    // === Storage ===
    pub use crate::storage::InMemoryDataStore;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use axum::http::StatusCode;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}
