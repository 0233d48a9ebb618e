//! Core types: schema descriptors, values, sessions, capabilities, the
//! store contract, and the error taxonomy

pub mod error;
pub mod pluralize;
pub mod resource;
pub mod schema;
pub mod session;
pub mod store;
pub mod value;

pub use error::{AuthError, ProtocolError, ServerError, ServerResult, StoreError};
pub use resource::{Action, FieldAccess, FunctionOutcome, OpenAccess, ResourceCapability};
pub use schema::{
    AttributeDescriptor, AttributeKind, Cardinality, EntityDescriptor, RelationshipDescriptor,
};
pub use session::{AuthContext, Session, generate_token};
pub use store::{DataStore, InstanceRef, RelationshipValue, ResourceId};
pub use value::{AttributeValue, FieldFormat};
