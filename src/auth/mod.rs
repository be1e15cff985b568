//! Authentication and authorization module
//!
//! Every guarded request passes two ordered stages: `authenticate` turns a
//! bearer token into an [`Identity`] (skipped on public routes), then
//! `authorize` checks the route's required permissions against the caller's
//! role.

mod jwt;
mod middleware;
mod password;
mod policy;
mod resolver;
mod service;

pub use jwt::TokenService;
pub use middleware::Guard;
pub use password::{BcryptHasher, PasswordHasher};
pub use policy::{catalog, RouteMeta, RoutePolicy};
pub use resolver::{PermissionCache, PermissionResolver};
pub use service::{AccessToken, AuthService};

use serde::{Deserialize, Serialize};

/// Superuser role: callers holding it skip every permission lookup.
/// Changing this name changes who is a superuser.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Role assigned to users created without an explicit role.
pub const DEFAULT_ROLE: &str = "USER";

/// Roles that the user-creation endpoint refuses to assign
pub const RESTRICTED_ROLES: &[&str] = &[ADMIN_ROLE, "MANAGER"];

/// Authenticated caller, derived from a verified token for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Option<String>,
}

impl Identity {
    #[cfg(test)]
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Some(role.into()),
        }
    }

    /// Role name, treating a blank claim as absent
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }
}
