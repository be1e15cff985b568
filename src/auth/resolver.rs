//! Permission resolution
//!
//! Decides whether an identity may use a route that declares required
//! permissions. Holding ANY one of the required permissions is enough.
//! The `ADMIN` role is allowed without consulting storage.

use crate::auth::{Identity, ADMIN_ROLE};
use crate::error::AppError;
use crate::repository::RoleRepository;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Why a request was refused. All of these render as 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("User not identified")]
    NotIdentified,
    #[error("Role not found")]
    RoleNotFound,
    #[error("You do not have permission to perform this action.")]
    InsufficientPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

struct CachedGrants {
    permissions: Arc<HashSet<String>>,
    fetched_at: Instant,
}

/// Role name -> permission names, kept for at most `ttl`.
///
/// Edits made through this process invalidate it immediately; edits made by
/// other processes become visible once the entry expires. Each invalidation
/// bumps `generation`, and a set read before the bump is never stored.
pub struct PermissionCache {
    ttl: Duration,
    generation: AtomicU64,
    entries: RwLock<HashMap<String, CachedGrants>>,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    async fn get(&self, role: &str) -> Option<Arc<HashSet<String>>> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read().await;
        entries
            .get(role)
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.permissions.clone())
    }

    /// Taken before reading storage and handed back to [`put`](Self::put)
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn put(&self, role: &str, permissions: Arc<HashSet<String>>, read_at: u64) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != read_at {
            debug!(role, "Discarding permission set read before an edit");
            return;
        }
        entries.insert(
            role.to_string(),
            CachedGrants {
                permissions,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every entry; called after any role or permission edit
    pub async fn invalidate_all(&self) {
        if self.is_enabled() {
            let mut entries = self.entries.write().await;
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.clear();
        }
    }
}

pub struct PermissionResolver {
    roles: Arc<dyn RoleRepository>,
    cache: Arc<PermissionCache>,
}

impl PermissionResolver {
    pub fn new(roles: Arc<dyn RoleRepository>, cache: Arc<PermissionCache>) -> Self {
        Self { roles, cache }
    }

    /// Evaluate access. Storage failures are returned as `Err`, never as a denial.
    pub async fn decide(
        &self,
        identity: Option<&Identity>,
        required: &BTreeSet<String>,
    ) -> Result<Decision, AppError> {
        if required.is_empty() {
            return Ok(Decision::Allow);
        }

        let Some(role) = identity.and_then(Identity::role_name) else {
            return Ok(Decision::Deny(Denial::NotIdentified));
        };

        if role == ADMIN_ROLE {
            return Ok(Decision::Allow);
        }

        let Some(granted) = self.granted_permissions(role).await? else {
            return Ok(Decision::Deny(Denial::RoleNotFound));
        };

        if required.iter().any(|p| granted.contains(p)) {
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny(Denial::InsufficientPermission))
        }
    }

    /// Like [`decide`](Self::decide) but turns a denial into `Forbidden`
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        required: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        match self.decide(identity, required).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => {
                warn!(
                    user_id = identity.map(|i| i.user_id.as_str()).unwrap_or("-"),
                    role = identity.and_then(Identity::role_name).unwrap_or("-"),
                    required = ?required,
                    "Access denied: {}",
                    denial
                );
                Err(AppError::Forbidden(denial.to_string()))
            }
        }
    }

    async fn granted_permissions(
        &self,
        role: &str,
    ) -> Result<Option<Arc<HashSet<String>>>, AppError> {
        if let Some(cached) = self.cache.get(role).await {
            debug!(role, "Permission cache hit");
            return Ok(Some(cached));
        }

        let read_at = self.cache.generation();
        let Some(found) = self.roles.find_role_with_permissions(role).await? else {
            return Ok(None);
        };

        let permissions = Arc::new(found.permission_names());
        self.cache.put(role, permissions.clone(), read_at).await;
        Ok(Some(permissions))
    }
}
