//! The server: registry, sessions, access decisions, projection, dispatch,
//! and transport exposure

pub mod access;
pub mod builder;
pub mod dispatcher;
pub mod exposure;
pub mod projection;
pub mod registry;
pub mod sessions;

pub use access::AccessEngine;
pub use builder::ServerBuilder;
pub use dispatcher::{ApiRequest, ApiResponse, Dispatcher};
pub use exposure::RestExposure;
pub use projection::Projector;
pub use registry::{RegistryError, SchemaRegistry};
pub use sessions::SessionManager;
