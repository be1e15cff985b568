//! Permission catalog management

use crate::auth::PermissionCache;
use crate::error::AppError;
use crate::models::{NamedRecordChanges, NamedRecordRequest, Permission};
use crate::repository::PermissionRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct PermissionService {
    permissions: Arc<dyn PermissionRepository>,
    cache: Arc<PermissionCache>,
}

impl PermissionService {
    pub fn new(permissions: Arc<dyn PermissionRepository>, cache: Arc<PermissionCache>) -> Self {
        Self { permissions, cache }
    }

    pub async fn create(&self, req: NamedRecordRequest) -> Result<Permission, AppError> {
        req.validate()?;
        let permission = self.permissions.insert_permission(req).await?;
        info!(permission = %permission.name, "Permission created");
        Ok(permission)
    }

    pub async fn find_all(&self) -> Result<Vec<Permission>, AppError> {
        self.permissions.list_permissions().await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Permission, AppError> {
        self.permissions
            .find_permission_by_id(id)
            .await?
            .ok_or_else(permission_not_found)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Permission, AppError> {
        self.permissions
            .find_permission_by_name(name)
            .await?
            .ok_or_else(permission_not_found)
    }

    /// Renaming changes what every holding role grants
    pub async fn update(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Permission, AppError> {
        changes.validate()?;
        let permission = self
            .permissions
            .update_permission(id, changes)
            .await?
            .ok_or_else(permission_not_found)?;

        self.cache.invalidate_all().await;
        Ok(permission)
    }

    /// Refused with `Conflict` while any role still holds it
    pub async fn remove(&self, id: Uuid) -> Result<Permission, AppError> {
        let permission = self
            .permissions
            .delete_permission(id)
            .await?
            .ok_or_else(permission_not_found)?;

        self.cache.invalidate_all().await;
        info!(permission = %permission.name, "Permission deleted");
        Ok(permission)
    }
}

fn permission_not_found() -> AppError {
    AppError::NotFound("Permission not found".to_string())
}
