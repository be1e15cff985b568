//! Role management and role-permission grants
//!
//! Any edit here can change what a role is allowed to do, so each one
//! drops the cached permission sets.

use crate::auth::PermissionCache;
use crate::error::AppError;
use crate::models::{NamedRecordChanges, NamedRecordRequest, Role, RoleWithPermissions};
use crate::repository::RoleRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    cache: Arc<PermissionCache>,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleRepository>, cache: Arc<PermissionCache>) -> Self {
        Self { roles, cache }
    }

    pub async fn create(&self, req: NamedRecordRequest) -> Result<Role, AppError> {
        req.validate()?;
        let role = self.roles.insert_role(req).await?;
        info!(role = %role.name, "Role created");
        Ok(role)
    }

    pub async fn find_all(&self) -> Result<Vec<Role>, AppError> {
        self.roles.list_roles().await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<RoleWithPermissions, AppError> {
        self.roles
            .find_role_by_id(id)
            .await?
            .ok_or_else(role_not_found)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Role, AppError> {
        self.roles
            .find_role_by_name(name)
            .await?
            .ok_or_else(role_not_found)
    }

    pub async fn update(&self, id: Uuid, changes: NamedRecordChanges) -> Result<Role, AppError> {
        changes.validate()?;
        let role = self
            .roles
            .update_role(id, changes)
            .await?
            .ok_or_else(role_not_found)?;

        self.cache.invalidate_all().await;
        Ok(role)
    }

    /// Refused with `Conflict` while users still hold the role
    pub async fn remove(&self, id: Uuid) -> Result<Role, AppError> {
        let role = self
            .roles
            .delete_role(id)
            .await?
            .ok_or_else(role_not_found)?;

        self.cache.invalidate_all().await;
        info!(role = %role.name, "Role deleted");
        Ok(role)
    }

    pub async fn add_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<RoleWithPermissions, AppError> {
        let role = self
            .roles
            .connect_permission(role_id, permission_id)
            .await?
            .ok_or_else(role_not_found)?;

        self.cache.invalidate_all().await;
        info!(role = %role.role.name, permission_id = %permission_id, "Permission granted");
        Ok(role)
    }

    pub async fn remove_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<RoleWithPermissions, AppError> {
        let role = self
            .roles
            .disconnect_permission(role_id, permission_id)
            .await?
            .ok_or_else(role_not_found)?;

        self.cache.invalidate_all().await;
        info!(role = %role.role.name, permission_id = %permission_id, "Permission revoked");
        Ok(role)
    }

    /// All-or-nothing: on failure the role keeps its previous set
    pub async fn replace_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<RoleWithPermissions, AppError> {
        let role = self
            .roles
            .replace_permissions(role_id, permission_ids)
            .await?
            .ok_or_else(role_not_found)?;

        self.cache.invalidate_all().await;
        info!(
            role = %role.role.name,
            count = role.permissions.len(),
            "Permission set replaced"
        );
        Ok(role)
    }
}

fn role_not_found() -> AppError {
    AppError::NotFound("Role not found".to_string())
}
