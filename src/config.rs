//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.
//! The JWT secret and expiry have no defaults: startup fails without them.

use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 10,
            require_tls: false,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Token signing configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl JwtConfig {
    /// Build from raw variable values. Both are required.
    pub fn from_vars(
        secret: Option<String>,
        expiration: Option<String>,
    ) -> Result<Self, ConfigError> {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let expiration = expiration
            .ok_or_else(|| ConfigError::MissingVar("JWT_EXPIRATION".to_string()))?;

        Ok(Self {
            secret,
            expiration: parse_duration(&expiration)?,
        })
    }
}

/// Password hashing and authorization tuning
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// Zero disables the role permission cache.
    pub permission_cache_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 10,
            permission_cache_ttl: Duration::ZERO,
        }
    }
}

/// Optional administrator created at startup when absent
#[derive(Clone, Default)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl BootstrapConfig {
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub bootstrap: BootstrapConfig,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        // Try to load DATABASE_URL first, fall back to individual vars
        let database = if let Ok(database_url) = std::env::var("DATABASE_URL") {
            Self::parse_database_url(&database_url)?
        } else {
            let defaults = DatabaseConfig::default();
            DatabaseConfig {
                host: std::env::var("DB_HOST").unwrap_or(defaults.host),
                port: std::env::var("DB_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.port),
                user: std::env::var("DB_USER").unwrap_or(defaults.user),
                password: std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
                database: std::env::var("DB_NAME").unwrap_or(defaults.database),
                max_pool_size: max_pool_size(),
                require_tls: defaults.require_tls,
            }
        };

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let jwt = JwtConfig::from_vars(
            std::env::var("JWT_SECRET").ok(),
            std::env::var("JWT_EXPIRATION").ok(),
        )?;

        let auth = AuthConfig {
            bcrypt_cost: match std::env::var("BCRYPT_COST") {
                Ok(raw) => parse_bcrypt_cost(&raw)?,
                Err(_) => AuthConfig::default().bcrypt_cost,
            },
            permission_cache_ttl: std::env::var("PERMISSION_CACHE_TTL_SECS")
                .ok()
                .map(|s| {
                    s.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                        ConfigError::InvalidValue(format!("PERMISSION_CACHE_TTL_SECS: {}", s))
                    })
                })
                .transpose()?
                .unwrap_or(Duration::ZERO),
        };

        let bootstrap = BootstrapConfig {
            admin_email: std::env::var("ADMIN_EMAIL").ok(),
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
        };

        Ok(Self {
            server,
            database,
            cors,
            jwt,
            auth,
            bootstrap,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string(),
            )
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(ConfigError::InvalidValue(
                "Missing database name in DATABASE_URL".to_string(),
            ));
        }

        let require_tls = parsed
            .query_pairs()
            .any(|(k, v)| k == "sslmode" && v == "require");

        Ok(DatabaseConfig {
            host,
            port: parsed.port().unwrap_or(5432),
            user: parsed.username().to_string(),
            password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
            database,
            max_pool_size: max_pool_size(),
            require_tls,
        })
    }
}

fn max_pool_size() -> usize {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

fn parse_bcrypt_cost(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(cost) if (4..=31).contains(&cost) => Ok(cost),
        _ => Err(ConfigError::InvalidValue(format!(
            "BCRYPT_COST must be between 4 and 31, got {}",
            raw
        ))),
    }
}

/// Parse a token lifetime such as `3600`, `90s`, `15m`, `1h` or `7d`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::InvalidValue(format!("JWT_EXPIRATION: {:?}", raw));

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    match amount.checked_mul(multiplier) {
        Some(0) | None => Err(invalid()),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}
