//! JWT token management
//!
//! Signs and verifies stateless access tokens. Expired tokens are never
//! accepted: validation runs with zero leeway.

use crate::auth::Identity;
use crate::config::JwtConfig;
use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            expires_in: i64::try_from(config.expiration.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Create a signed access token for a user
    pub fn sign(&self, user_id: &str, role: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role: Some(role.to_string()),
            iat: now,
            exp: now.saturating_add(self.expires_in),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create access token: {}", e)))
    }

    /// Decode and validate a token into the caller's identity
    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
                _ => {
                    debug!("Token rejected: {}", e);
                    AppError::Unauthorized("Invalid token".to_string())
                }
            })?;

        Ok(Identity {
            user_id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}
