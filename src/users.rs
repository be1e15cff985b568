//! User management
//!
//! Accounts are soft-deleted: removal stamps `deleted_at` and the row stays
//! restorable. Every account references exactly one role, `USER` unless
//! another role is named at creation.

use crate::auth::{PasswordHasher, ADMIN_ROLE, DEFAULT_ROLE, RESTRICTED_ROLES};
use crate::error::AppError;
use crate::models::{CreateUserRequest, NewUser, Role, User, UserChanges, UserWithRole};
use crate::repository::{RoleRepository, UserRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            roles,
            hasher,
        }
    }

    /// Create an account through the API. Roles listed in
    /// [`RESTRICTED_ROLES`] cannot be assigned here.
    pub async fn create(&self, req: CreateUserRequest) -> Result<UserWithRole, AppError> {
        req.validate()?;

        let role = match req.role_id {
            Some(role_id) => {
                let role = self.existing_role(role_id).await?;
                if RESTRICTED_ROLES.contains(&role.name.to_uppercase().as_str()) {
                    return Err(AppError::Forbidden(
                        "You cannot create this role from this endpoint.".to_string(),
                    ));
                }
                role
            }
            None => self.default_role().await?,
        };

        self.insert(req, role).await
    }

    pub async fn find_all(&self) -> Result<Vec<User>, AppError> {
        self.users.list_users(false).await
    }

    pub async fn find_all_deleted(&self) -> Result<Vec<User>, AppError> {
        self.users.list_users(true).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .find_user_by_id(id)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<UserWithRole, AppError> {
        self.users
            .find_user_by_email(email)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, AppError> {
        changes.validate()?;
        self.users
            .update_user(id, changes)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Soft delete
    pub async fn remove(&self, id: Uuid) -> Result<User, AppError> {
        let user = self
            .users
            .soft_delete_user(id, Utc::now())
            .await?
            .ok_or_else(user_not_found)?;

        info!(user_id = %id, "User soft-deleted");
        Ok(user)
    }

    pub async fn restore(&self, id: Uuid) -> Result<User, AppError> {
        let user = self
            .users
            .restore_user(id)
            .await?
            .ok_or_else(user_not_found)?;

        info!(user_id = %id, "User restored");
        Ok(user)
    }

    pub async fn change_role(&self, id: Uuid, role_id: Uuid) -> Result<UserWithRole, AppError> {
        let role = self.existing_role(role_id).await?;
        let user = self
            .users
            .set_user_role(id, role.id)
            .await?
            .ok_or_else(user_not_found)?;

        info!(user_id = %id, role = %role.name, "User role changed");
        Ok(user)
    }

    /// Create the bootstrap administrator unless the email is already taken,
    /// including by a soft-deleted account
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.users.find_user_by_email(email).await?.is_some() {
            return Ok(());
        }

        let role = self
            .roles
            .find_role_by_name(ADMIN_ROLE)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Role {} is missing", ADMIN_ROLE)))?;

        let req = CreateUserRequest {
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            password: password.to_string(),
            phone: None,
            address: None,
            role_id: Some(role.id),
        };
        req.validate()?;

        match self.insert(req, role).await {
            Ok(_) => {
                info!(email, "Bootstrap administrator created");
                Ok(())
            }
            Err(AppError::Conflict(_)) => {
                warn!(
                    email,
                    "Bootstrap administrator email belongs to a deleted account, skipping"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, req: CreateUserRequest, role: Role) -> Result<UserWithRole, AppError> {
        let password_hash = self.hasher.hash(&req.password)?;

        let created = self
            .users
            .insert_user(NewUser {
                email: req.email,
                full_name: req.full_name,
                password_hash,
                phone: req.phone,
                address: req.address,
                role_id: role.id,
            })
            .await?;

        info!(user_id = %created.user.id, role = %role.name, "User created");
        Ok(created)
    }

    async fn existing_role(&self, role_id: Uuid) -> Result<Role, AppError> {
        self.roles
            .find_role_by_id(role_id)
            .await?
            .map(|found| found.role)
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))
    }

    async fn default_role(&self) -> Result<Role, AppError> {
        match self.roles.find_role_by_name(DEFAULT_ROLE).await? {
            Some(role) => Ok(role),
            None => {
                warn!(role = DEFAULT_ROLE, "Default role is missing");
                Err(AppError::Internal(
                    "The system is not configured correctly (missing default role)".to_string(),
                ))
            }
        }
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BcryptHasher;
    use crate::db::memory::MemoryStore;
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    fn service(store: &Arc<MemoryStore>) -> UserService {
        UserService::new(store.clone(), store.clone(), Arc::new(BcryptHasher::new(4)))
    }

    fn request(email: &str, role_id: Option<Uuid>) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password: "pa55word".to_string(),
            phone: Some("555-0100".to_string()),
            address: None,
            role_id,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_default_role() {
        let store = Arc::new(MemoryStore::new());
        let user_role = store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);

        let created = users.create(request("a@example.com", None)).await.unwrap();
        assert_eq!(created.role.id, user_role.id);
        assert_eq!(created.user.role_id, user_role.id);
        assert_ne!(created.user.password_hash, "pa55word");
    }

    #[tokio::test]
    async fn test_create_without_default_role_inserts_nothing() {
        let store = Arc::new(MemoryStore::new());
        let users = service(&store);

        match users.create(request("a@example.com", None)).await {
            Err(AppError::Internal(msg)) => assert_eq!(
                msg,
                "The system is not configured correctly (missing default role)"
            ),
            other => panic!("expected internal error, got {:?}", other),
        }
        assert!(users.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_explicit_role() {
        let store = Arc::new(MemoryStore::new());
        let clerk = store.seed_role("CLERK", &["docs.read"]).await;
        let users = service(&store);

        let created = users
            .create(request("a@example.com", Some(clerk.id)))
            .await
            .unwrap();
        assert_eq!(created.role.name, "CLERK");
    }

    #[tokio::test]
    async fn test_create_rejects_restricted_roles() {
        let store = Arc::new(MemoryStore::new());
        let admin = store.seed_role(ADMIN_ROLE, &[]).await;
        let manager = store.seed_role("MANAGER", &[]).await;
        let users = service(&store);

        for role in [admin, manager] {
            let result = users.create(request("a@example.com", Some(role.id))).await;
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }
        assert!(users.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_unknown_role_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let users = service(&store);

        let result = users
            .create(request("a@example.com", Some(Uuid::new_v4())))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);

        let result = users.create(request("not-an-email", None)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut long_phone = request("a@example.com", None);
        long_phone.phone = Some("1".repeat(21));
        assert!(matches!(
            users.create(long_phone).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);

        users.create(request("a@example.com", None)).await.unwrap();
        let result = users.create(request("a@example.com", None)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);
        let id = users
            .create(request("a@example.com", None))
            .await
            .unwrap()
            .user
            .id;

        let removed = users.remove(id).await.unwrap();
        assert!(removed.is_deleted());

        assert!(matches!(users.find_by_id(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            users.find_by_email("a@example.com").await,
            Err(AppError::NotFound(_))
        ));
        assert!(users.find_all().await.unwrap().is_empty());
        let deleted = users.find_all_deleted().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, id);

        // Already deleted
        assert!(matches!(users.remove(id).await, Err(AppError::NotFound(_))));

        let restored = users.restore(id).await.unwrap();
        assert!(!restored.is_deleted());
        assert_eq!(users.find_by_id(id).await.unwrap().email, "a@example.com");
        assert!(users.find_all_deleted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_be_updated() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);
        let id = users
            .create(request("a@example.com", None))
            .await
            .unwrap()
            .user
            .id;
        users.remove(id).await.unwrap();

        let changes = UserChanges {
            full_name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(matches!(
            users.update(id, changes).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let users = service(&store);
        let id = users
            .create(request("a@example.com", None))
            .await
            .unwrap()
            .user
            .id;

        let updated = users
            .update(
                id,
                UserChanges {
                    address: Some("1 Main St".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Test User");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.address.as_deref(), Some("1 Main St"));
    }

    #[tokio::test]
    async fn test_change_role() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        let manager = store.seed_role("MANAGER", &["users.read"]).await;
        let users = service(&store);
        let id = users
            .create(request("a@example.com", None))
            .await
            .unwrap()
            .user
            .id;

        let changed = users.change_role(id, manager.id).await.unwrap();
        assert_eq!(changed.role.name, "MANAGER");

        assert!(matches!(
            users.change_role(id, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            users.change_role(Uuid::new_v4(), manager.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(ADMIN_ROLE, &[]).await;
        let users = service(&store);

        assert_ok!(users.ensure_admin("root@example.com", "rootpass").await);
        assert_ok!(users.ensure_admin("root@example.com", "rootpass").await);

        let admin = users.find_by_email("root@example.com").await.unwrap();
        assert_eq!(admin.role.name, ADMIN_ROLE);
        assert_eq!(users.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_skips_soft_deleted_email() {
        let store = Arc::new(MemoryStore::new());
        store.seed_role(DEFAULT_ROLE, &[]).await;
        store.seed_role(ADMIN_ROLE, &[]).await;
        let users = service(&store);

        let former = users.create(request("root@example.com", None)).await.unwrap();
        users.remove(former.user.id).await.unwrap();

        assert_ok!(users.ensure_admin("root@example.com", "rootpass").await);
        assert!(users.find_all().await.unwrap().is_empty());
        assert_eq!(users.find_all_deleted().await.unwrap().len(), 1);
    }
}
