//! Authentication route handlers
//!
//! Provides the public login endpoint and the current-identity endpoint.

use crate::auth::{AccessToken, Guard, Identity, RouteMeta};
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

pub fn router(state: &SharedState) -> Router<SharedState> {
    let guard = Guard::new(state, RouteMeta::new().public());

    Router::new()
        .route("/login", guard.route(RouteMeta::new(), post(login)))
        .route("/me", guard.route(RouteMeta::new().authenticated(), get(me)))
}

/// POST /login
///
/// Exchange email and password for an access token.
async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AccessToken>> {
    req.validate()?;
    let token = state.auth.sign_in(&req.email, &req.password).await?;
    Ok(Json(token))
}

/// GET /me
async fn me(identity: Identity) -> Json<Identity> {
    Json(identity)
}
