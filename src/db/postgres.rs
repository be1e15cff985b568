//! PostgreSQL-backed store
//!
//! Implements every repository trait on a single deadpool connection pool.
//! Constraint violations bubble up as `tokio_postgres::Error` and are
//! classified by `AppError`'s `From` impl.

use super::queries;
use crate::error::AppError;
use crate::models::{
    NamedRecordChanges, NamedRecordRequest, NewUser, Permission, Role, RoleWithPermissions, User,
    UserChanges, UserWithRole,
};
use crate::repository::{PermissionRepository, RoleRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::{Client, Row};
use tracing::debug;
use uuid::Uuid;

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn role_with_permissions(
        client: &Client,
        role: Role,
    ) -> Result<RoleWithPermissions, AppError> {
        let rows = client.query(queries::ROLE_PERMISSIONS, &[&role.id]).await?;
        Ok(RoleWithPermissions {
            role,
            permissions: rows.iter().map(|r| permission_from_row(r, 0)).collect(),
        })
    }

    async fn load_role(
        client: &Client,
        role_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        match client.query_opt(queries::FIND_ROLE_BY_ID, &[&role_id]).await? {
            Some(row) => Ok(Some(
                Self::role_with_permissions(client, role_from_row(&row, 0)).await?,
            )),
            None => Ok(None),
        }
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        email: row.get(1),
        full_name: row.get(2),
        password_hash: row.get(3),
        phone: row.get(4),
        address: row.get(5),
        role_id: row.get(6),
        created_at: row.get(7),
        updated_at: row.get(8),
        deleted_at: row.get(9),
    }
}

fn role_from_row(row: &Row, offset: usize) -> Role {
    Role {
        id: row.get(offset),
        name: row.get(offset + 1),
        description: row.get(offset + 2),
        created_at: row.get(offset + 3),
        updated_at: row.get(offset + 4),
    }
}

fn permission_from_row(row: &Row, offset: usize) -> Permission {
    Permission {
        id: row.get(offset),
        name: row.get(offset + 1),
        description: row.get(offset + 2),
        created_at: row.get(offset + 3),
        updated_at: row.get(offset + 4),
    }
}

fn user_with_role_from_row(row: &Row) -> UserWithRole {
    UserWithRole {
        user: user_from_row(row),
        role: role_from_row(row, 10),
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserWithRole, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::INSERT_USER,
                &[
                    &Uuid::new_v4(),
                    &user.email,
                    &user.full_name,
                    &user.password_hash,
                    &user.phone,
                    &user.address,
                    &user.role_id,
                    &Utc::now(),
                ],
            )
            .await?;
        Ok(user_with_role_from_row(&row))
    }

    async fn list_users(&self, deleted: bool) -> Result<Vec<User>, AppError> {
        let client = self.pool.get().await?;
        let sql = if deleted {
            queries::LIST_DELETED_USERS
        } else {
            queries::LIST_USERS
        };
        let rows = client.query(sql, &[]).await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::FIND_USER_BY_ID, &[&id]).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithRole>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::FIND_USER_BY_EMAIL, &[&email]).await?;
        Ok(row.as_ref().map(user_with_role_from_row))
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                queries::UPDATE_USER,
                &[&id, &changes.full_name, &changes.phone, &changes.address],
            )
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn soft_delete_user(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::SOFT_DELETE_USER, &[&id, &at]).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn restore_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::RESTORE_USER, &[&id]).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_user_role(
        &self,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Option<UserWithRole>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::SET_USER_ROLE, &[&id, &role_id]).await?;
        Ok(row.as_ref().map(user_with_role_from_row))
    }
}

#[async_trait]
impl RoleRepository for PgStore {
    async fn insert_role(&self, role: NamedRecordRequest) -> Result<Role, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::INSERT_ROLE,
                &[&Uuid::new_v4(), &role.name, &role.description, &Utc::now()],
            )
            .await?;
        Ok(role_from_row(&row, 0))
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_ROLES, &[]).await?;
        Ok(rows.iter().map(|r| role_from_row(r, 0)).collect())
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<RoleWithPermissions>, AppError> {
        let client = self.pool.get().await?;
        Self::load_role(&client, id).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::FIND_ROLE_BY_NAME, &[&name]).await?;
        Ok(row.map(|r| role_from_row(&r, 0)))
    }

    async fn find_role_with_permissions(
        &self,
        name: &str,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        let client = self.pool.get().await?;
        match client.query_opt(queries::FIND_ROLE_BY_NAME, &[&name]).await? {
            Some(row) => Ok(Some(
                Self::role_with_permissions(&client, role_from_row(&row, 0)).await?,
            )),
            None => Ok(None),
        }
    }

    async fn update_role(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Role>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::UPDATE_ROLE, &[&id, &changes.name, &changes.description])
            .await?;
        Ok(row.map(|r| role_from_row(&r, 0)))
    }

    async fn delete_role(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::DELETE_ROLE, &[&id]).await?;
        Ok(row.map(|r| role_from_row(&r, 0)))
    }

    async fn connect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        let client = self.pool.get().await?;
        if client.query_opt(queries::FIND_ROLE_BY_ID, &[&role_id]).await?.is_none() {
            return Ok(None);
        }
        if client
            .query_opt(queries::FIND_PERMISSION_BY_ID, &[&permission_id])
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Permission not found".to_string()));
        }

        client
            .execute(queries::CONNECT_PERMISSION, &[&role_id, &permission_id])
            .await?;
        Self::load_role(&client, role_id).await
    }

    async fn disconnect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        let client = self.pool.get().await?;
        if client.query_opt(queries::FIND_ROLE_BY_ID, &[&role_id]).await?.is_none() {
            return Ok(None);
        }

        client
            .execute(queries::DISCONNECT_PERMISSION, &[&role_id, &permission_id])
            .await?;
        Self::load_role(&client, role_id).await
    }

    async fn replace_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        let mut ids = permission_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        // Dropping `tx` without commit rolls everything back.
        if tx.query_opt(queries::LOCK_ROLE_BY_ID, &[&role_id]).await?.is_none() {
            return Ok(None);
        }

        let found: i64 = tx.query_one(queries::COUNT_PERMISSIONS, &[&ids]).await?.get(0);
        if found as usize != ids.len() {
            return Err(AppError::NotFound("Permission not found".to_string()));
        }

        tx.execute(queries::CLEAR_PERMISSIONS, &[&role_id]).await?;
        if !ids.is_empty() {
            tx.execute(queries::CONNECT_PERMISSIONS, &[&role_id, &ids]).await?;
        }
        tx.commit().await?;

        debug!(%role_id, count = ids.len(), "Replaced role permissions");
        Self::load_role(&client, role_id).await
    }
}

#[async_trait]
impl PermissionRepository for PgStore {
    async fn insert_permission(
        &self,
        permission: NamedRecordRequest,
    ) -> Result<Permission, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                queries::INSERT_PERMISSION,
                &[
                    &Uuid::new_v4(),
                    &permission.name,
                    &permission.description,
                    &Utc::now(),
                ],
            )
            .await?;
        Ok(permission_from_row(&row, 0))
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_PERMISSIONS, &[]).await?;
        Ok(rows.iter().map(|r| permission_from_row(r, 0)).collect())
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::FIND_PERMISSION_BY_ID, &[&id]).await?;
        Ok(row.map(|r| permission_from_row(&r, 0)))
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::FIND_PERMISSION_BY_NAME, &[&name])
            .await?;
        Ok(row.map(|r| permission_from_row(&r, 0)))
    }

    async fn update_permission(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Permission>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                queries::UPDATE_PERMISSION,
                &[&id, &changes.name, &changes.description],
            )
            .await?;
        Ok(row.map(|r| permission_from_row(&r, 0)))
    }

    async fn delete_permission(&self, id: Uuid) -> Result<Option<Permission>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(queries::DELETE_PERMISSION, &[&id]).await?;
        Ok(row.map(|r| permission_from_row(&r, 0)))
    }
}
