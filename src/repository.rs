//! Persistence contracts
//!
//! Services and the permission resolver talk to storage only through these
//! traits, shared as `Arc<dyn ...>` across handlers. Lookups return `Ok(None)`
//! for absent rows; `Err` is reserved for real failures (unreachable
//! datastore, constraint violations) so callers can tell them apart.

use crate::error::AppError;
use crate::models::{
    NamedRecordChanges, NamedRecordRequest, NewUser, Permission, Role, RoleWithPermissions, User,
    UserChanges, UserWithRole,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<UserWithRole, AppError>;

    /// Non-deleted users when `deleted` is false, soft-deleted ones otherwise
    async fn list_users(&self, deleted: bool) -> Result<Vec<User>, AppError>;

    // Standard lookups skip soft-deleted rows.
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithRole>, AppError>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError>;

    /// Marks a live user deleted; `None` when no live user has that id
    async fn soft_delete_user(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;

    /// Clears `deleted_at`; finds the row regardless of its deletion state
    async fn restore_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn set_user_role(
        &self,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Option<UserWithRole>, AppError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn insert_role(&self, role: NamedRecordRequest) -> Result<Role, AppError>;
    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;
    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<RoleWithPermissions>, AppError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError>;

    /// Role plus its permission set, as used by authorization
    async fn find_role_with_permissions(
        &self,
        name: &str,
    ) -> Result<Option<RoleWithPermissions>, AppError>;

    async fn update_role(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Role>, AppError>;

    /// Fails with `Conflict` while any user still references the role
    async fn delete_role(&self, id: Uuid) -> Result<Option<Role>, AppError>;

    async fn connect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError>;

    async fn disconnect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError>;

    /// Replaces the whole permission set atomically: either every id is
    /// connected or the previous set is left untouched.
    async fn replace_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithPermissions>, AppError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn insert_permission(&self, permission: NamedRecordRequest)
        -> Result<Permission, AppError>;
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;
    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AppError>;
    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>, AppError>;
    async fn update_permission(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Permission>, AppError>;

    /// Fails with `Conflict` while any role still holds the permission
    async fn delete_permission(&self, id: Uuid) -> Result<Option<Permission>, AppError>;
}

/// The three stores, usually backed by one implementation
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + RoleRepository + PermissionRepository + 'static,
    {
        Self {
            users: store.clone(),
            roles: store.clone(),
            permissions: store,
        }
    }
}
