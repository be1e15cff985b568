//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::auth::{
    AuthService, BcryptHasher, PasswordHasher, PermissionCache, PermissionResolver, TokenService,
};
use crate::config::{AuthConfig, JwtConfig};
use crate::error::AppError;
use crate::permissions::PermissionService;
use crate::repository::Repositories;
use crate::roles::RoleService;
use crate::users::UserService;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub users: UserService,
    pub roles: RoleService,
    pub permissions: PermissionService,
    pub auth: AuthService,

    /// Verifies bearer tokens on guarded routes
    pub tokens: Arc<TokenService>,

    /// Decides whether a caller's role satisfies a route's permissions
    pub resolver: PermissionResolver,
}

impl AppState {
    pub fn new(repos: Repositories, jwt: &JwtConfig, auth: &AuthConfig) -> Result<Self, AppError> {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(auth.bcrypt_cost));
        let tokens = Arc::new(TokenService::new(jwt));
        let cache = Arc::new(PermissionCache::new(auth.permission_cache_ttl));

        Ok(Self {
            users: UserService::new(repos.users.clone(), repos.roles.clone(), hasher.clone()),
            roles: RoleService::new(repos.roles.clone(), cache.clone()),
            permissions: PermissionService::new(repos.permissions.clone(), cache.clone()),
            auth: AuthService::new(repos.users, hasher, tokens.clone())?,
            tokens,
            resolver: PermissionResolver::new(repos.roles, cache),
        })
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;

/// State over an in-memory store, with a cheap bcrypt cost and no cache
#[cfg(test)]
pub fn test_state(store: Arc<crate::db::memory::MemoryStore>) -> SharedState {
    use std::time::Duration;

    let jwt = JwtConfig {
        secret: "test-secret".to_string(),
        expiration: Duration::from_secs(3600),
    };
    let auth = AuthConfig {
        bcrypt_cost: 4,
        permission_cache_ttl: Duration::ZERO,
    };

    Arc::new(
        AppState::new(Repositories::from_store(store), &jwt, &auth)
            .expect("test state should build"),
    )
}
