//! Request dispatch: route matching and the per-request state machine
//!
//! Every request walks the same states: route match, authenticate,
//! authorize, execute, render, respond. The dispatcher sequences the
//! session manager, access engine, projector, and store; it is also the
//! single place errors become HTTP statuses.
//!
//! The dispatcher is transport-agnostic: it consumes parsed requests and
//! produces status/body pairs. The REST exposure adapts it onto axum.

use crate::config::ServerConfig;
use crate::core::error::{AuthError, ProtocolError, ServerError, ServerResult, StoreError};
use crate::core::resource::Action;
use crate::core::schema::EntityDescriptor;
use crate::core::session::AuthContext;
use crate::core::store::{DataStore, InstanceRef, ResourceId};
use crate::server::access::AccessEngine;
use crate::server::projection::Projector;
use crate::server::registry::SchemaRegistry;
use crate::server::sessions::SessionManager;
use axum::body::Bytes;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A parsed request as the transport delivers it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// A bodyless, headerless request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Attach a bearer session token
    pub fn with_token(mut self, token: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// Attach a JSON body
    pub fn with_json(mut self, value: &Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self
    }

    /// The session token presented in the Authorization header, if any.
    /// Accepts both `Bearer <token>` and a bare token value.
    pub fn session_token(&self) -> Option<String> {
        let raw = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// The response handed back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ApiResponse {
    /// 200 with a JSON body
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    /// 200 with an empty body
    pub fn ok_empty() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
        }
    }

    /// The wire form of an error
    pub fn from_error(error: &ServerError) -> Self {
        let response = error.to_response();
        Self {
            status: error.status_code(),
            body: serde_json::to_value(response).ok(),
        }
    }
}

/// One matched route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Login,
    Create {
        resource: &'a str,
    },
    Read {
        resource: &'a str,
        id: ResourceId,
    },
    Update {
        resource: &'a str,
        id: ResourceId,
    },
    Delete {
        resource: &'a str,
        id: ResourceId,
    },
    Function {
        resource: &'a str,
        id: ResourceId,
        name: &'a str,
    },
}

/// Map method + path onto an action.
///
/// `login_path` is the registry-normalized login path. Anything that does
/// not fit the table, including non-numeric ids, matches nothing.
fn match_route<'a>(method: &Method, path: &'a str, login_path: &str) -> Option<Route<'a>> {
    let trimmed = path.trim_matches('/');

    if *method == Method::POST && trimmed == login_path {
        return Some(Route::Login);
    }

    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [resource] if *method == Method::POST => Some(Route::Create { resource }),
        [resource, id] => {
            let id = id.parse().ok()?;
            if *method == Method::GET {
                Some(Route::Read { resource, id })
            } else if *method == Method::PUT {
                Some(Route::Update { resource, id })
            } else if *method == Method::DELETE {
                Some(Route::Delete { resource, id })
            } else {
                None
            }
        }
        [resource, id, name] if *method == Method::POST => {
            let id = id.parse().ok()?;
            Some(Route::Function { resource, id, name })
        }
        _ => None,
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(rename = "clientID")]
    client_id: ResourceId,
    #[serde(rename = "clientSecret")]
    client_secret: String,
    username: String,
    password: String,
}

/// Per-instance critical sections so a multi-field edit is never observable
/// half-applied. Held only across the verify/apply pair, never across
/// unrelated instances.
#[derive(Clone, Default)]
struct InstanceLocks(Arc<Mutex<HashMap<InstanceRef, Arc<Mutex<()>>>>>);

impl InstanceLocks {
    async fn acquire(&self, instance: &InstanceRef) -> Arc<Mutex<()>> {
        let mut locks = self.0.lock().await;
        locks
            .entry(instance.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The protocol state machine.
pub struct Dispatcher {
    store: Arc<dyn DataStore>,
    registry: Arc<SchemaRegistry>,
    config: ServerConfig,
    sessions: SessionManager,
    access: AccessEngine,
    projector: Projector,
    locks: InstanceLocks,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn DataStore>, registry: SchemaRegistry, config: ServerConfig) -> Self {
        let registry = Arc::new(registry);
        let access = AccessEngine::new(store.clone(), registry.clone());
        let projector = Projector::new(store.clone(), access.clone());
        let sessions = SessionManager::new(store.clone(), registry.clone(), config.session_ttl());
        Self {
            store,
            registry,
            config,
            sessions,
            access,
            projector,
            locks: InstanceLocks::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one request to completion. Never panics, never leaks store
    /// detail; every failure maps to its status code here and nowhere else.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(error) => {
                match &error {
                    ServerError::Store(inner) => {
                        tracing::error!(
                            method = %request.method,
                            path = %request.path,
                            error = %inner,
                            "store failure while handling request"
                        );
                    }
                    other => {
                        tracing::debug!(
                            method = %request.method,
                            path = %request.path,
                            error = %other,
                            "request rejected"
                        );
                    }
                }
                ApiResponse::from_error(&error)
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> ServerResult<ApiResponse> {
        let route = match_route(&request.method, &request.path, self.registry.login_path())
            .ok_or_else(|| ProtocolError::UnknownRoute {
                method: request.method.to_string(),
                path: request.path.clone(),
            })?;

        match route {
            Route::Login => self.handle_login(request).await,
            Route::Create { resource } => self.handle_create(resource, request).await,
            Route::Read { resource, id } => self.handle_read(resource, id, request).await,
            Route::Update { resource, id } => self.handle_update(resource, id, request).await,
            Route::Delete { resource, id } => self.handle_delete(resource, id, request).await,
            Route::Function { resource, id, name } => {
                self.handle_function(resource, id, name, request).await
            }
        }
    }

    async fn handle_login(&self, request: &ApiRequest) -> ServerResult<ApiResponse> {
        let login: LoginRequest =
            serde_json::from_slice(&request.body).map_err(|e| ProtocolError::MalformedBody {
                message: e.to_string(),
            })?;

        let session = self
            .sessions
            .login(
                login.client_id,
                &login.client_secret,
                &login.username,
                &login.password,
            )
            .await?;

        Ok(ApiResponse::ok(json!({
            "token": session.token,
            "userID": session.user_id,
        })))
    }

    async fn handle_create(
        &self,
        resource: &str,
        request: &ApiRequest,
    ) -> ServerResult<ApiResponse> {
        let entity = self.resolve_entity(resource, request)?;
        let payload = Self::parse_object_body(request)?;
        let ctx = self.authenticate(request).await?;

        if !self
            .access
            .can_access(&ctx, &entity.name, Action::Create)
            .await
        {
            return Err(AuthError::Forbidden {
                action: format!("create {}", entity.name),
            }
            .into());
        }

        // Shape problems are caught before anything exists; permission
        // problems are checked against the created instance and roll it
        // back, so a refused create leaves no trace.
        self.projector.verify_shape(entity, &payload)?;

        // Runs as a detached task: transport cancellation must not strand a
        // half-populated instance.
        let store = self.store.clone();
        let projector = self.projector.clone();
        let locks = self.locks.clone();
        let entity = entity.clone();
        let id = spawn_edit(async move {
            let instance = store.create(&entity.name).await?;
            let lock = locks.acquire(&instance).await;
            let _guard = lock.lock().await;

            let applied = async {
                projector.verify_access(&instance, &payload, &ctx).await?;
                projector.apply_edit(&entity, &instance, &payload).await
            }
            .await;
            if let Err(error) = applied {
                if let Err(cleanup) = store.delete(&instance).await {
                    tracing::error!(
                        entity = %instance.entity,
                        id = instance.id,
                        error = %cleanup,
                        "failed to roll back refused create"
                    );
                }
                return Err(error);
            }
            Ok(instance.id)
        })
        .await?;

        Ok(ApiResponse::ok(json!({ "id": id })))
    }

    async fn handle_read(
        &self,
        resource: &str,
        id: ResourceId,
        request: &ApiRequest,
    ) -> ServerResult<ApiResponse> {
        let entity = self.resolve_entity(resource, request)?;
        let instance = self.resolve_instance(entity, id).await?;
        let ctx = self.authenticate(request).await?;

        // Visibility is field-grained, never object-grained: a caller who
        // can read nothing still gets 200 with an empty object.
        let rendered = self.projector.render(entity, &instance, &ctx).await?;
        Ok(ApiResponse::ok(Value::Object(rendered)))
    }

    async fn handle_update(
        &self,
        resource: &str,
        id: ResourceId,
        request: &ApiRequest,
    ) -> ServerResult<ApiResponse> {
        let entity = self.resolve_entity(resource, request)?;
        let instance = self.resolve_instance(entity, id).await?;
        let payload = Self::parse_object_body(request)?;
        let ctx = self.authenticate(request).await?;

        // Runs as a detached task: once verification passes, the write
        // completes even if the transport abandons the request.
        let projector = self.projector.clone();
        let locks = self.locks.clone();
        let entity = entity.clone();
        spawn_edit(async move {
            let lock = locks.acquire(&instance).await;
            let _guard = lock.lock().await;

            projector
                .verify_edit(&entity, &instance, &payload, &ctx)
                .await?;
            projector.apply_edit(&entity, &instance, &payload).await
        })
        .await?;

        Ok(ApiResponse::ok_empty())
    }

    async fn handle_delete(
        &self,
        resource: &str,
        id: ResourceId,
        request: &ApiRequest,
    ) -> ServerResult<ApiResponse> {
        let entity = self.resolve_entity(resource, request)?;
        let instance = self.resolve_instance(entity, id).await?;
        let ctx = self.authenticate(request).await?;

        if !self
            .access
            .can_access(&ctx, &entity.name, Action::Delete(&instance))
            .await
        {
            return Err(AuthError::Forbidden {
                action: format!("delete {} {}", entity.name, id),
            }
            .into());
        }

        self.store.delete(&instance).await?;
        Ok(ApiResponse::ok_empty())
    }

    async fn handle_function(
        &self,
        resource: &str,
        id: ResourceId,
        name: &str,
        request: &ApiRequest,
    ) -> ServerResult<ApiResponse> {
        let entity = self.resolve_entity(resource, request)?;
        let instance = self.resolve_instance(entity, id).await?;
        let payload = Self::parse_optional_body(request)?;
        let ctx = self.authenticate(request).await?;

        let forbidden = || AuthError::Forbidden {
            action: format!("call {} on {} {}", name, entity.name, id),
        };

        // An unknown function is refused exactly like a denied one, and the
        // handler is never consulted for either.
        let Some(capability) = self.registry.capability_for(&entity.name) else {
            return Err(forbidden().into());
        };
        if !capability.function_names().contains(&name) {
            return Err(forbidden().into());
        }
        if !self
            .access
            .can_access(&ctx, &entity.name, Action::CallFunction(&instance, name))
            .await
        {
            return Err(forbidden().into());
        }

        let outcome = capability
            .handle_function(&instance, name, payload, &ctx, self.store.as_ref())
            .await
            .map_err(ServerError::from)?;

        Ok(ApiResponse {
            status: outcome.status,
            body: outcome.body,
        })
    }

    fn resolve_entity(
        &self,
        resource: &str,
        request: &ApiRequest,
    ) -> ServerResult<&EntityDescriptor> {
        self.registry.entity_for_path(resource).ok_or_else(|| {
            ProtocolError::UnknownRoute {
                method: request.method.to_string(),
                path: request.path.clone(),
            }
            .into()
        })
    }

    async fn resolve_instance(
        &self,
        entity: &EntityDescriptor,
        id: ResourceId,
    ) -> ServerResult<InstanceRef> {
        self.store
            .fetch(&entity.name, id)
            .await?
            .ok_or_else(|| ServerError::NotFound {
                entity: entity.name.clone(),
                id,
            })
    }

    async fn authenticate(&self, request: &ApiRequest) -> ServerResult<AuthContext> {
        let Some(token) = request.session_token() else {
            return Ok(AuthContext::Anonymous);
        };
        Ok(match self.sessions.session_for_token(&token).await? {
            Some(session) => AuthContext::Session(session),
            None => AuthContext::Anonymous,
        })
    }

    fn parse_object_body(request: &ApiRequest) -> ServerResult<Map<String, Value>> {
        let value: Value =
            serde_json::from_slice(&request.body).map_err(|e| ProtocolError::MalformedBody {
                message: e.to_string(),
            })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ProtocolError::MalformedBody {
                message: "expected a JSON object".to_string(),
            }
            .into()),
        }
    }

    fn parse_optional_body(request: &ApiRequest) -> ServerResult<Option<Value>> {
        if request.body.is_empty() {
            return Ok(None);
        }
        let value: Value =
            serde_json::from_slice(&request.body).map_err(|e| ProtocolError::MalformedBody {
                message: e.to_string(),
            })?;
        Ok(Some(value))
    }

}

/// Run a mutation to completion on its own task and surface its result.
///
/// The spawned task keeps running if the caller is dropped, so transport
/// cancellation can never leave an edit half-applied.
async fn spawn_edit<T>(
    work: impl Future<Output = ServerResult<T>> + Send + 'static,
) -> ServerResult<T>
where
    T: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(join_error) => Err(ServerError::Store(StoreError::Backend {
            message: format!("edit task failed: {}", join_error),
        })),
    }
}
