/// Configuration management for the account service
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used in links sent by email
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: i64,
    /// Email verification token lifetime in seconds
    pub verification_token_ttl: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// One week
pub const DEFAULT_ACCESS_TOKEN_TTL: i64 = 7 * 24 * 3600;
/// One day
pub const DEFAULT_VERIFICATION_TOKEN_TTL: i64 = 24 * 3600;
/// Upper bound for either token lifetime
pub const MAX_TOKEN_TTL: i64 = 10 * 365 * 24 * 3600;
pub const DEFAULT_LOG_FILTER: &str = "account_service=debug,tower_http=debug";

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ACCOUNTS_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("ACCOUNTS_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid port number".to_string()))?;
        let public_url = env::var("ACCOUNTS_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let database_path = env::var("ACCOUNTS_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/accounts.sqlite"));
        let max_connections = env::var("ACCOUNTS_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("ACCOUNTS_JWT_SECRET")
            .map_err(|_| ApiError::Config("JWT secret required".to_string()))?;
        let access_token_ttl = parse_seconds("ACCOUNTS_ACCESS_TOKEN_TTL", DEFAULT_ACCESS_TOKEN_TTL)?;
        let verification_token_ttl = parse_seconds(
            "ACCOUNTS_VERIFICATION_TOKEN_TTL",
            DEFAULT_VERIFICATION_TOKEN_TTL,
        )?;

        let email = if let Ok(smtp_url) = env::var("ACCOUNTS_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("ACCOUNTS_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        let json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                database_path,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl,
                verification_token_ttl,
            },
            email,
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Config("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_token_ttl <= 0
            || self.authentication.verification_token_ttl <= 0
        {
            return Err(ApiError::Config("Token lifetimes must be positive".to_string()));
        }

        if self.authentication.access_token_ttl > MAX_TOKEN_TTL
            || self.authentication.verification_token_ttl > MAX_TOKEN_TTL
        {
            return Err(ApiError::Config(format!(
                "Token lifetimes cannot exceed {} seconds",
                MAX_TOKEN_TTL
            )));
        }

        if self.storage.max_connections == 0 {
            return Err(ApiError::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        Ok(())
    }

    /// Listen address in `host:port` form
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}

fn parse_seconds(var: &str, default: i64) -> ApiResult<i64> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("{} must be a number of seconds", var))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 5000,
            public_url: "http://localhost:5000".to_string(),
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        authentication: AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            verification_token_ttl: DEFAULT_VERIFICATION_TOKEN_TTL,
        },
        email: None,
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: false,
        },
    }
}
