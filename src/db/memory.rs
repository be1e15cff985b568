//! In-memory store for tests
//!
//! Mirrors the PostgreSQL constraints: unique names and emails, restricted
//! deletes, cascading grant removal and all-or-nothing permission
//! replacement. One lock guards all tables so every operation is atomic.

use crate::error::AppError;
use crate::models::{
    NamedRecordChanges, NamedRecordRequest, NewUser, Permission, Role, RoleWithPermissions, User,
    UserChanges, UserWithRole,
};
use crate::repository::{PermissionRepository, RoleRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    grants: BTreeSet<(Uuid, Uuid)>,
}

impl Tables {
    fn role_with_permissions(&self, role: &Role) -> RoleWithPermissions {
        let mut permissions: Vec<Permission> = self
            .grants
            .iter()
            .filter(|(role_id, _)| *role_id == role.id)
            .filter_map(|(_, permission_id)| self.permissions.get(permission_id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        RoleWithPermissions {
            role: role.clone(),
            permissions,
        }
    }

    fn with_role(&self, user: &User) -> Result<UserWithRole, AppError> {
        let role = self
            .roles
            .get(&user.role_id)
            .cloned()
            .ok_or_else(|| AppError::Conflict("Referenced role does not exist".to_string()))?;
        Ok(UserWithRole {
            user: user.clone(),
            role,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    role_lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of role-with-permissions lookups served so far
    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the datastore were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("datastore unavailable".to_string()));
        }
        Ok(())
    }

    /// Seed a role with the given permission names, creating missing permissions
    pub async fn seed_role(&self, name: &str, permissions: &[&str]) -> Role {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());

        for permission_name in permissions {
            let existing = tables
                .permissions
                .values()
                .find(|p| p.name == *permission_name)
                .map(|p| p.id);
            let permission_id = match existing {
                Some(id) => id,
                None => {
                    let permission = Permission {
                        id: Uuid::new_v4(),
                        name: permission_name.to_string(),
                        description: None,
                        created_at: now,
                        updated_at: now,
                    };
                    let id = permission.id;
                    tables.permissions.insert(id, permission);
                    id
                }
            };
            tables.grants.insert((role.id, permission_id));
        }
        role
    }
}

// Same wording the Postgres unique-violation mapping produces
fn duplicate() -> AppError {
    AppError::Conflict("A record with that value already exists".to_string())
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserWithRole, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(duplicate());
        }
        if !tables.roles.contains_key(&user.role_id) {
            return Err(AppError::Conflict(
                "The record is still referenced by related data".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            phone: user.phone,
            address: user.address,
            role_id: user.role_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.users.insert(user.id, user.clone());
        tables.with_role(&user)
    }

    async fn list_users(&self, deleted: bool) -> Result<Vec<User>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.is_deleted() == deleted)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithRole>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email && !u.is_deleted())
            .map(|u| tables.with_role(u))
            .transpose()
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id).filter(|u| !u.is_deleted()) else {
            return Ok(None);
        };
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(address) = changes.address {
            user.address = Some(address);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn soft_delete_user(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id).filter(|u| !u.is_deleted()) else {
            return Ok(None);
        };
        user.deleted_at = Some(at);
        user.updated_at = at;
        Ok(Some(user.clone()))
    }

    async fn restore_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.deleted_at = None;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_user_role(
        &self,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Option<UserWithRole>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(AppError::Conflict(
                "The record is still referenced by related data".to_string(),
            ));
        }
        let Some(user) = tables.users.get_mut(&id).filter(|u| !u.is_deleted()) else {
            return Ok(None);
        };
        user.role_id = role_id;
        user.updated_at = Utc::now();
        let user = user.clone();
        tables.with_role(&user).map(Some)
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn insert_role(&self, role: NamedRecordRequest) -> Result<Role, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|r| r.name == role.name) {
            return Err(duplicate());
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: role.name,
            description: role.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<RoleWithPermissions>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.roles.get(&id).map(|r| tables.role_with_permissions(r)))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn find_role_with_permissions(
        &self,
        name: &str,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .find(|r| r.name == name)
            .map(|r| tables.role_with_permissions(r)))
    }

    async fn update_role(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Role>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(name) = &changes.name {
            if tables.roles.values().any(|r| r.id != id && &r.name == name) {
                return Err(duplicate());
            }
        }
        let Some(role) = tables.roles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = Some(description);
        }
        role.updated_at = Utc::now();
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&id) {
            return Ok(None);
        }
        if tables.users.values().any(|u| u.role_id == id) {
            return Err(AppError::Conflict(
                "The record is still referenced by related data".to_string(),
            ));
        }
        tables.grants.retain(|(role_id, _)| *role_id != id);
        Ok(tables.roles.remove(&id))
    }

    async fn connect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(role) = tables.roles.get(&role_id).cloned() else {
            return Ok(None);
        };
        if !tables.permissions.contains_key(&permission_id) {
            return Err(AppError::NotFound("Permission not found".to_string()));
        }
        tables.grants.insert((role_id, permission_id));
        Ok(Some(tables.role_with_permissions(&role)))
    }

    async fn disconnect_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(role) = tables.roles.get(&role_id).cloned() else {
            return Ok(None);
        };
        tables.grants.remove(&(role_id, permission_id));
        Ok(Some(tables.role_with_permissions(&role)))
    }

    async fn replace_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithPermissions>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(role) = tables.roles.get(&role_id).cloned() else {
            return Ok(None);
        };
        if permission_ids
            .iter()
            .any(|id| !tables.permissions.contains_key(id))
        {
            return Err(AppError::NotFound("Permission not found".to_string()));
        }

        tables.grants.retain(|(rid, _)| *rid != role_id);
        for permission_id in permission_ids {
            tables.grants.insert((role_id, *permission_id));
        }
        Ok(Some(tables.role_with_permissions(&role)))
    }
}

#[async_trait]
impl PermissionRepository for MemoryStore {
    async fn insert_permission(
        &self,
        permission: NamedRecordRequest,
    ) -> Result<Permission, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.permissions.values().any(|p| p.name == permission.name) {
            return Err(duplicate());
        }
        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            name: permission.name,
            description: permission.description,
            created_at: now,
            updated_at: now,
        };
        tables.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>, AppError> {
        self.check_available()?;
        Ok(self.tables.read().await.permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn update_permission(
        &self,
        id: Uuid,
        changes: NamedRecordChanges,
    ) -> Result<Option<Permission>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(name) = &changes.name {
            if tables.permissions.values().any(|p| p.id != id && &p.name == name) {
                return Err(duplicate());
            }
        }
        let Some(permission) = tables.permissions.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            permission.name = name;
        }
        if let Some(description) = changes.description {
            permission.description = Some(description);
        }
        permission.updated_at = Utc::now();
        Ok(Some(permission.clone()))
    }

    async fn delete_permission(&self, id: Uuid) -> Result<Option<Permission>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.permissions.contains_key(&id) {
            return Ok(None);
        }
        if tables.grants.iter().any(|(_, permission_id)| *permission_id == id) {
            return Err(AppError::Conflict(
                "The record is still referenced by related data".to_string(),
            ));
        }
        Ok(tables.permissions.remove(&id))
    }
}
