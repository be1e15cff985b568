//! Role route handlers
//!
//! Managing roles needs `roles.manage`; reads also accept `roles.read`.

use crate::auth::{catalog, Guard, RouteMeta};
use crate::error::ApiResult;
use crate::models::{
    NameQuery, NamedRecordChanges, NamedRecordRequest, ReplacePermissionsRequest, Role,
    RoleWithPermissions,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let guard = Guard::new(
        state,
        RouteMeta::new().permissions(&[catalog::ROLES_MANAGE]),
    );
    let read = || RouteMeta::new().permissions(&[catalog::ROLES_READ, catalog::ROLES_MANAGE]);

    Router::new()
        .route(
            "/roles",
            guard
                .route(RouteMeta::new(), post(create_role))
                .merge(guard.route(read(), get(list_roles))),
        )
        .route(
            "/roles/{id}",
            guard
                .route(read(), get(get_role))
                .merge(guard.route(RouteMeta::new(), patch(update_role)))
                .merge(guard.route(RouteMeta::new(), delete(remove_role))),
        )
        .route(
            "/roles/{id}/permissions",
            guard.route(RouteMeta::new(), put(replace_permissions)),
        )
        .route(
            "/roles/{id}/permissions/{permission_id}",
            guard
                .route(RouteMeta::new(), post(add_permission))
                .merge(guard.route(RouteMeta::new(), delete(remove_permission))),
        )
}

/// POST /roles
async fn create_role(
    State(state): State<SharedState>,
    Json(req): Json<NamedRecordRequest>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state.roles.create(req).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /roles
///
/// With `?name=` returns the single matching role instead of the list.
async fn list_roles(
    State(state): State<SharedState>,
    Query(query): Query<NameQuery>,
) -> ApiResult<Response> {
    match query.name {
        Some(name) => Ok(Json(state.roles.find_by_name(&name).await?).into_response()),
        None => Ok(Json(state.roles.find_all().await?).into_response()),
    }
}

/// GET /roles/{id}
async fn get_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RoleWithPermissions>> {
    Ok(Json(state.roles.find_by_id(id).await?))
}

/// PATCH /roles/{id}
async fn update_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<NamedRecordChanges>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.roles.update(id, changes).await?))
}

/// DELETE /roles/{id}
async fn remove_role(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.roles.remove(id).await?))
}

/// PUT /roles/{id}/permissions
async fn replace_permissions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplacePermissionsRequest>,
) -> ApiResult<Json<RoleWithPermissions>> {
    Ok(Json(
        state
            .roles
            .replace_permissions(id, &req.permission_ids)
            .await?,
    ))
}

/// POST /roles/{id}/permissions/{permission_id}
async fn add_permission(
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<RoleWithPermissions>> {
    Ok(Json(state.roles.add_permission(id, permission_id).await?))
}

/// DELETE /roles/{id}/permissions/{permission_id}
async fn remove_permission(
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<RoleWithPermissions>> {
    Ok(Json(state.roles.remove_permission(id, permission_id).await?))
}
