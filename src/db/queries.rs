//! SQL query constants
//!
//! Contains all SQL used by the PostgreSQL store. Column order is fixed:
//! users (10 columns) then roles (5 columns) when joined, and the row
//! mappers in `postgres.rs` read by position.

// ============================================
// Schema
// ============================================

pub const CREATE_ROLES: &str = r#"
    CREATE TABLE IF NOT EXISTS roles (
        id UUID PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_PERMISSIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id UUID PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// Dropping a role drops its grants; a granted permission cannot be dropped.
pub const CREATE_ROLE_PERMISSIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id UUID NOT NULL REFERENCES permissions(id) ON DELETE RESTRICT,
        PRIMARY KEY (role_id, permission_id)
    )
"#;

pub const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email VARCHAR(255) UNIQUE NOT NULL,
        full_name VARCHAR(100) NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        phone VARCHAR(20),
        address VARCHAR(200),
        role_id UUID NOT NULL REFERENCES roles(id) ON DELETE RESTRICT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users(deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_role_permissions_permission_id ON role_permissions(permission_id)",
];

pub const ENSURE_ROLE: &str = r#"
    INSERT INTO roles (id, name, description) VALUES ($1, $2, $3)
    ON CONFLICT (name) DO NOTHING
"#;

pub const ENSURE_PERMISSION: &str = r#"
    INSERT INTO permissions (id, name, description) VALUES ($1, $2, $3)
    ON CONFLICT (name) DO NOTHING
"#;

// ============================================
// Users
// ============================================

pub const INSERT_USER: &str = r#"
    WITH inserted AS (
        INSERT INTO users (id, email, full_name, password_hash, phone, address, role_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING *
    )
    SELECT u.id, u.email, u.full_name, u.password_hash, u.phone, u.address, u.role_id,
           u.created_at, u.updated_at, u.deleted_at,
           r.id, r.name, r.description, r.created_at, r.updated_at
    FROM inserted u
    JOIN roles r ON r.id = u.role_id
"#;

pub const LIST_USERS: &str = r#"
    SELECT id, email, full_name, password_hash, phone, address, role_id,
           created_at, updated_at, deleted_at
    FROM users
    WHERE deleted_at IS NULL
    ORDER BY created_at
"#;

pub const LIST_DELETED_USERS: &str = r#"
    SELECT id, email, full_name, password_hash, phone, address, role_id,
           created_at, updated_at, deleted_at
    FROM users
    WHERE deleted_at IS NOT NULL
    ORDER BY deleted_at DESC
"#;

pub const FIND_USER_BY_ID: &str = r#"
    SELECT id, email, full_name, password_hash, phone, address, role_id,
           created_at, updated_at, deleted_at
    FROM users
    WHERE id = $1 AND deleted_at IS NULL
"#;

pub const FIND_USER_BY_EMAIL: &str = r#"
    SELECT u.id, u.email, u.full_name, u.password_hash, u.phone, u.address, u.role_id,
           u.created_at, u.updated_at, u.deleted_at,
           r.id, r.name, r.description, r.created_at, r.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
    WHERE u.email = $1 AND u.deleted_at IS NULL
"#;

pub const UPDATE_USER: &str = r#"
    UPDATE users
    SET full_name = COALESCE($2, full_name),
        phone = COALESCE($3, phone),
        address = COALESCE($4, address),
        updated_at = NOW()
    WHERE id = $1 AND deleted_at IS NULL
    RETURNING id, email, full_name, password_hash, phone, address, role_id,
              created_at, updated_at, deleted_at
"#;

pub const SOFT_DELETE_USER: &str = r#"
    UPDATE users
    SET deleted_at = $2, updated_at = $2
    WHERE id = $1 AND deleted_at IS NULL
    RETURNING id, email, full_name, password_hash, phone, address, role_id,
              created_at, updated_at, deleted_at
"#;

pub const RESTORE_USER: &str = r#"
    UPDATE users
    SET deleted_at = NULL, updated_at = NOW()
    WHERE id = $1
    RETURNING id, email, full_name, password_hash, phone, address, role_id,
              created_at, updated_at, deleted_at
"#;

pub const SET_USER_ROLE: &str = r#"
    WITH updated AS (
        UPDATE users
        SET role_id = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING *
    )
    SELECT u.id, u.email, u.full_name, u.password_hash, u.phone, u.address, u.role_id,
           u.created_at, u.updated_at, u.deleted_at,
           r.id, r.name, r.description, r.created_at, r.updated_at
    FROM updated u
    JOIN roles r ON r.id = u.role_id
"#;

// ============================================
// Roles
// ============================================

pub const INSERT_ROLE: &str = r#"
    INSERT INTO roles (id, name, description, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $4)
    RETURNING id, name, description, created_at, updated_at
"#;

pub const LIST_ROLES: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM roles
    ORDER BY name
"#;

pub const FIND_ROLE_BY_ID: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM roles
    WHERE id = $1
"#;

pub const LOCK_ROLE_BY_ID: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM roles
    WHERE id = $1
    FOR UPDATE
"#;

pub const FIND_ROLE_BY_NAME: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM roles
    WHERE name = $1
"#;

pub const UPDATE_ROLE: &str = r#"
    UPDATE roles
    SET name = COALESCE($2, name),
        description = COALESCE($3, description),
        updated_at = NOW()
    WHERE id = $1
    RETURNING id, name, description, created_at, updated_at
"#;

pub const DELETE_ROLE: &str = r#"
    DELETE FROM roles
    WHERE id = $1
    RETURNING id, name, description, created_at, updated_at
"#;

pub const ROLE_PERMISSIONS: &str = r#"
    SELECT p.id, p.name, p.description, p.created_at, p.updated_at
    FROM permissions p
    JOIN role_permissions rp ON rp.permission_id = p.id
    WHERE rp.role_id = $1
    ORDER BY p.name
"#;

pub const CONNECT_PERMISSION: &str = r#"
    INSERT INTO role_permissions (role_id, permission_id)
    VALUES ($1, $2)
    ON CONFLICT DO NOTHING
"#;

pub const DISCONNECT_PERMISSION: &str = r#"
    DELETE FROM role_permissions
    WHERE role_id = $1 AND permission_id = $2
"#;

pub const CLEAR_PERMISSIONS: &str = r#"
    DELETE FROM role_permissions
    WHERE role_id = $1
"#;

pub const CONNECT_PERMISSIONS: &str = r#"
    INSERT INTO role_permissions (role_id, permission_id)
    SELECT $1, UNNEST($2::uuid[])
"#;

pub const COUNT_PERMISSIONS: &str = r#"
    SELECT COUNT(*) FROM permissions WHERE id = ANY($1)
"#;

// ============================================
// Permissions
// ============================================

pub const INSERT_PERMISSION: &str = r#"
    INSERT INTO permissions (id, name, description, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $4)
    RETURNING id, name, description, created_at, updated_at
"#;

pub const LIST_PERMISSIONS: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM permissions
    ORDER BY name
"#;

pub const FIND_PERMISSION_BY_ID: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM permissions
    WHERE id = $1
"#;

pub const FIND_PERMISSION_BY_NAME: &str = r#"
    SELECT id, name, description, created_at, updated_at
    FROM permissions
    WHERE name = $1
"#;

pub const UPDATE_PERMISSION: &str = r#"
    UPDATE permissions
    SET name = COALESCE($2, name),
        description = COALESCE($3, description),
        updated_at = NOW()
    WHERE id = $1
    RETURNING id, name, description, created_at, updated_at
"#;

pub const DELETE_PERMISSION: &str = r#"
    DELETE FROM permissions
    WHERE id = $1
    RETURNING id, name, description, created_at, updated_at
"#;
