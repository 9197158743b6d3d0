/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db::{self, user::UserStore},
    error::ApiResult,
    mailer::Mailer,
    token::TokenCodec,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let db = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let mailer = Mailer::from_config(config.email.as_ref(), &config.service.public_url)?;
        if config.email.is_none() {
            tracing::warn!("No SMTP server configured; verification emails will only be logged");
        }

        Ok(Self::from_parts(config, db, mailer))
    }

    /// Assemble a context from an already migrated pool and a mailer
    pub fn from_parts(config: ServerConfig, db: SqlitePool, mailer: Mailer) -> Self {
        let tokens = TokenCodec::from_config(&config.authentication);
        let accounts = Arc::new(AccountManager::new(UserStore::new(db.clone()), tokens, mailer));

        Self {
            config: Arc::new(config),
            db,
            accounts,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> &str {
        &self.config.service.public_url
    }
}
