//! Per-route access metadata
//!
//! Each route declares whether it is public and which permissions it
//! requires. Declarations exist at two levels, controller (route group) and
//! handler; the handler value wins field by field. Everything is resolved
//! once, while the router is being built.

use std::collections::BTreeSet;

/// Declared access metadata for a controller or a single handler.
/// `None` means "not declared at this level".
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    public: Option<bool>,
    permissions: Option<Vec<String>>,
}

impl RouteMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip authentication entirely
    pub fn public(mut self) -> Self {
        self.public = Some(true);
        self
    }

    /// Require authentication even if the controller is public
    pub fn authenticated(mut self) -> Self {
        self.public = Some(false);
        self
    }

    /// Permissions of which the caller must hold at least one
    pub fn permissions(mut self, names: &[&str]) -> Self {
        self.permissions = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

/// Effective access rule of one route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    public: bool,
    required: BTreeSet<String>,
}

impl RoutePolicy {
    pub fn resolve(handler: &RouteMeta, controller: &RouteMeta) -> Self {
        let public = handler.public.or(controller.public).unwrap_or(false);
        let required = handler
            .permissions
            .as_ref()
            .or(controller.permissions.as_ref())
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default();

        Self { public, required }
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Empty when the route does not gate on permissions
    pub fn required_permissions(&self) -> &BTreeSet<String> {
        &self.required
    }
}

/// Permission names known to the API, seeded at startup
pub mod catalog {
    pub const USERS_CREATE: &str = "users.create";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_UPDATE: &str = "users.update";
    pub const USERS_CHANGE_ROLE: &str = "users.change-role";
    pub const USERS_DELETE: &str = "users.delete";
    pub const USERS_RESTORE: &str = "users.restore";

    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_MANAGE: &str = "roles.manage";

    pub const PERMISSIONS_READ: &str = "permissions.read";
    pub const PERMISSIONS_MANAGE: &str = "permissions.manage";

    pub const ALL: &[(&str, &str)] = &[
        (USERS_CREATE, "Create users"),
        (USERS_READ, "List and view users"),
        (USERS_UPDATE, "Edit user profiles"),
        (USERS_CHANGE_ROLE, "Assign a role to a user"),
        (USERS_DELETE, "Soft-delete users"),
        (USERS_RESTORE, "Restore soft-deleted users"),
        (ROLES_READ, "List and view roles"),
        (ROLES_MANAGE, "Create, edit and delete roles and their grants"),
        (PERMISSIONS_READ, "List and view permissions"),
        (PERMISSIONS_MANAGE, "Create, edit and delete permissions"),
    ];
}
