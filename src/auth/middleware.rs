//! Authentication and authorization middleware
//!
//! Each guarded route gets its own [`Gate`] carrying the route's resolved
//! policy, and two ordered middlewares run against it: [`authenticate`]
//! then [`authorize`].

use crate::auth::{Identity, RouteMeta, RoutePolicy};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::warn;

/// Middleware state for one route
#[derive(Clone)]
pub struct Gate {
    state: SharedState,
    policy: Arc<RoutePolicy>,
}

impl Gate {
    pub fn new(state: SharedState, policy: RoutePolicy) -> Self {
        Self {
            state,
            policy: Arc::new(policy),
        }
    }
}

/// Verify the bearer token and attach the caller's identity.
/// Public routes pass through with no identity attached.
pub async fn authenticate(
    State(gate): State<Gate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if gate.policy.is_public() {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())?;
    let identity = gate.state.tokens.verify(&token).map_err(|e| {
        warn!(path = %request.uri().path(), "Authentication failed: {}", e);
        e
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Check the route's required permissions against the caller's role
pub async fn authorize(
    State(gate): State<Gate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate.state
        .resolver
        .authorize(
            request.extensions().get::<Identity>(),
            gate.policy.required_permissions(),
        )
        .await?;

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    if !headers.contains_key(AUTHORIZATION) {
        return Err(AppError::Unauthorized(
            "Missing authorization header".to_string(),
        ));
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))
}

/// Binds a controller-level [`RouteMeta`] to the application state and
/// wraps handlers with the gate chain
pub struct Guard {
    state: SharedState,
    controller: RouteMeta,
}

impl Guard {
    pub fn new(state: &SharedState, controller: RouteMeta) -> Self {
        Self {
            state: state.clone(),
            controller,
        }
    }

    pub fn route(
        &self,
        handler: RouteMeta,
        method_router: MethodRouter<SharedState>,
    ) -> MethodRouter<SharedState> {
        let gate = Gate::new(
            self.state.clone(),
            RoutePolicy::resolve(&handler, &self.controller),
        );

        method_router.route_layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(gate.clone(), authenticate))
                .layer(from_fn_with_state(gate, authorize)),
        )
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("User not identified".to_string()))
    }
}

impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned())
    }
}
