//! Permission route handlers

use crate::auth::{catalog, Guard, RouteMeta};
use crate::error::ApiResult;
use crate::models::{NameQuery, NamedRecordChanges, NamedRecordRequest, Permission};
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
    let guard = Guard::new(
        state,
        RouteMeta::new().permissions(&[catalog::PERMISSIONS_MANAGE]),
    );
    let read = || {
        RouteMeta::new().permissions(&[catalog::PERMISSIONS_READ, catalog::PERMISSIONS_MANAGE])
    };

    Router::new()
        .route(
            "/permissions",
            guard
                .route(RouteMeta::new(), post(create_permission))
                .merge(guard.route(read(), get(list_permissions))),
        )
        .route(
            "/permissions/{id}",
            guard
                .route(read(), get(get_permission))
                .merge(guard.route(RouteMeta::new(), patch(update_permission)))
                .merge(guard.route(RouteMeta::new(), delete(remove_permission))),
        )
}

/// POST /permissions
async fn create_permission(
    State(state): State<SharedState>,
    Json(req): Json<NamedRecordRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let permission = state.permissions.create(req).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// GET /permissions
///
/// With `?name=` returns the single matching permission instead of the list.
async fn list_permissions(
    State(state): State<SharedState>,
    Query(query): Query<NameQuery>,
) -> ApiResult<Response> {
    match query.name {
        Some(name) => Ok(Json(state.permissions.find_by_name(&name).await?).into_response()),
        None => Ok(Json(state.permissions.find_all().await?).into_response()),
    }
}

/// GET /permissions/{id}
async fn get_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.permissions.find_by_id(id).await?))
}

/// PATCH /permissions/{id}
async fn update_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<NamedRecordChanges>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.permissions.update(id, changes).await?))
}

/// DELETE /permissions/{id}
async fn remove_permission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Permission>> {
    Ok(Json(state.permissions.remove(id).await?))
}
