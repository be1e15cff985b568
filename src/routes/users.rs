//! User route handlers

use crate::auth::{catalog, Guard, RouteMeta};
use crate::error::ApiResult;
use crate::models::{
    ChangeUserRoleRequest, CreateUserRequest, User, UserChanges, UserQuery, UserWithRole,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let guard = Guard::new(state, RouteMeta::new());
    let needs = |permission: &str| RouteMeta::new().permissions(&[permission]);

    Router::new()
        .route(
            "/users",
            guard
                .route(needs(catalog::USERS_CREATE), post(create_user))
                .merge(guard.route(needs(catalog::USERS_READ), get(list_users))),
        )
        .route(
            "/users/deleted",
            guard.route(needs(catalog::USERS_READ), get(list_deleted_users)),
        )
        .route(
            "/users/{id}",
            guard
                .route(needs(catalog::USERS_READ), get(get_user))
                .merge(guard.route(needs(catalog::USERS_UPDATE), patch(update_user)))
                .merge(guard.route(needs(catalog::USERS_DELETE), delete(remove_user))),
        )
        .route(
            "/users/{id}/role",
            guard.route(needs(catalog::USERS_CHANGE_ROLE), patch(change_role)),
        )
        .route(
            "/users/{id}/restore",
            guard.route(needs(catalog::USERS_RESTORE), post(restore_user)),
        )
}

/// POST /users
async fn create_user(
    State(state): State<SharedState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserWithRole>)> {
    let user = state.users.create(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
///
/// With `?email=` returns the single matching user instead of the list.
async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Response> {
    match query.email {
        Some(email) => Ok(Json(state.users.find_by_email(&email).await?).into_response()),
        None => Ok(Json(state.users.find_all().await?).into_response()),
    }
}

/// GET /users/deleted
async fn list_deleted_users(State(state): State<SharedState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.users.find_all_deleted().await?))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.find_by_id(id).await?))
}

/// PATCH /users/{id}
async fn update_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<UserChanges>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.update(id, changes).await?))
}

/// PATCH /users/{id}/role
async fn change_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeUserRoleRequest>,
) -> ApiResult<Json<UserWithRole>> {
    Ok(Json(state.users.change_role(id, req.role_id).await?))
}

/// DELETE /users/{id}
async fn remove_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.remove(id).await?))
}

/// POST /users/{id}/restore
async fn restore_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.restore(id).await?))
}
