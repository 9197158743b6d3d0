/// Account Service
///
/// User account management over HTTP: registration with email verification,
/// bearer-token login, profile management and per-user statistics, backed by
/// SQLite.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mailer;
pub mod metrics;
pub mod server;
pub mod token;
pub mod validation;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
