//! Credential verification
//!
//! Exchanges an email and password for a signed access token.

use crate::auth::{PasswordHasher, TokenService};
use crate::error::AppError;
use crate::repository::UserRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Response body of a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
    // Compared against when the account does not exist, so a miss costs
    // the same bcrypt round as a wrong password
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenService>,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash("not-a-real-password")?;
        Ok(Self {
            users,
            hasher,
            tokens,
            dummy_hash,
        })
    }

    /// Every credential failure yields the same `Unauthorized` message.
    /// Datastore errors are propagated untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AccessToken, AppError> {
        let Some(found) = self.users.find_user_by_email(email).await? else {
            self.hasher.verify(password, &self.dummy_hash)?;
            warn!("Login failed: unknown account");
            return Err(invalid_credentials());
        };

        if !self.hasher.verify(password, &found.user.password_hash)? {
            warn!(user_id = %found.user.id, "Login failed: wrong password");
            return Err(invalid_credentials());
        }

        let access_token = self
            .tokens
            .sign(&found.user.id.to_string(), &found.role.name)?;

        info!(user_id = %found.user.id, role = %found.role.name, "User signed in");
        Ok(AccessToken { access_token })
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}
