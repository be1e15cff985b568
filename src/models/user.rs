//! User models
//!
//! Accounts always reference exactly one role. `deleted_at` marks a
//! soft-deleted account that standard lookups must skip.

use super::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// User represents an account in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)] // Never send password hash to client
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    #[cfg(test)]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// User joined with its role
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: User,
    pub role: Role,
}

/// Insert payload handed to the repository (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role_id: Uuid,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeUserRoleRequest {
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub email: Option<String>,
}
