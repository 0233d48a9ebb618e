//! Per-entity behavior: the capability interface
//!
//! The dispatcher and the access engine are entity-agnostic; everything a
//! resource type decides for itself (who may create or delete it, who sees
//! which field, what its functions do) lives behind [`ResourceCapability`].
//! One implementation is bound per entity at registry construction.

use crate::core::session::AuthContext;
use crate::core::store::{DataStore, InstanceRef};
use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;

/// A type-level or instance-level action a caller wants to perform.
///
/// Delete and function calls carry the target instance so a capability can
/// refuse at instance granularity (a user may delete their own account but
/// nobody else's).
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Create,
    Delete(&'a InstanceRef),
    CallFunction(&'a InstanceRef, &'a str),
}

/// Visibility of one field for one request.
///
/// Ordered: `None < Read < ReadWrite`, so rendering checks
/// `access >= FieldAccess::Read` and edits check `>= FieldAccess::ReadWrite`.
/// Computed fresh on every request; never cached, because access may depend
/// on mutable relationship state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldAccess {
    None,
    Read,
    ReadWrite,
}

/// Result of a resource function invocation.
///
/// The dispatcher passes this through untouched: the function owns its
/// status code and body.
#[derive(Debug, Clone)]
pub struct FunctionOutcome {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl FunctionOutcome {
    /// A 200 outcome with a JSON body
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    /// A bodyless outcome with the given status
    pub fn status(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

/// Behavior one entity type supplies about itself.
///
/// Implementations receive the store so decisions can consult live state
/// (ownership relationships, membership lists). They must not mutate
/// anything from `can_perform` or `field_access`; only `handle_function`
/// may write.
#[async_trait]
pub trait ResourceCapability: Send + Sync {
    /// May `ctx` perform `action` on this entity type (or instance)?
    async fn can_perform(
        &self,
        action: Action<'_>,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<bool>;

    /// Visibility of `field` on `instance` for `ctx`.
    async fn field_access(
        &self,
        instance: &InstanceRef,
        field: &str,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FieldAccess>;

    /// Run a resource function. Only called for names in
    /// [`function_names`](Self::function_names) and after `can_perform`
    /// allowed the call.
    async fn handle_function(
        &self,
        instance: &InstanceRef,
        name: &str,
        payload: Option<Value>,
        ctx: &AuthContext,
        store: &dyn DataStore,
    ) -> Result<FunctionOutcome>;

    /// Names of the functions this entity exposes. A call to any other name
    /// is refused before the handler is consulted.
    fn function_names(&self) -> &[&str] {
        &[]
    }
}

/// Capability that allows every action and grants read-write on every field.
///
/// For development and tests. Exposes no functions.
pub struct OpenAccess;

#[async_trait]
impl ResourceCapability for OpenAccess {
    async fn can_perform(
        &self,
        _action: Action<'_>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn field_access(
        &self,
        _instance: &InstanceRef,
        _field: &str,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FieldAccess> {
        Ok(FieldAccess::ReadWrite)
    }

    async fn handle_function(
        &self,
        _instance: &InstanceRef,
        name: &str,
        _payload: Option<Value>,
        _ctx: &AuthContext,
        _store: &dyn DataStore,
    ) -> Result<FunctionOutcome> {
        Err(anyhow::anyhow!("no function named '{}'", name))
    }
}
