/// Account management system
///
/// Handles registration, email verification, login and profile operations.

mod manager;
pub mod password;
pub mod state;

pub use manager::AccountManager;
pub use state::AccountState;

use crate::{
    db::user::{RelationCounts, User},
    validation::{validate_name, validate_password_strength, validate_username},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration request
///
/// Missing fields deserialize as empty strings so they are reported by
/// field validation rather than as a body parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(
        length(min = 5, max = 25, message = "Username must be between 5 and 25 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(
        email(message = "Invalid email address"),
        length(max = 254, message = "Email is too long")
    )]
    pub email: String,
    #[validate(
        length(min = 8, max = 64, message = "Password must be between 8 and 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    /// Defaults to the username when absent
    #[validate(
        length(min = 2, max = 30, message = "Name must be between 2 and 30 characters"),
        custom(function = "validate_name")
    )]
    pub name: Option<String>,
}

/// Login request; `username` may also be the account email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Absolute expiry as a unix timestamp in seconds
    pub expiry: f64,
}

/// Resend verification email request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResendEmailRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Profile update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 5, max = 25, message = "Username must be between 5 and 25 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(
        email(message = "Invalid email address"),
        length(max = 254, message = "Email is too long")
    )]
    pub email: Option<String>,
    #[validate(
        length(min = 2, max = 30, message = "Name must be between 2 and 30 characters"),
        custom(function = "validate_name")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio is too long"))]
    pub bio: Option<String>,
    #[validate(length(max = 255, message = "Location is too long"))]
    pub location: Option<String>,
    #[validate(length(max = 255, message = "Occupation is too long"))]
    pub occupation: Option<String>,
    #[validate(length(max = 255, message = "Organization is too long"))]
    pub organization: Option<String>,
    #[validate(length(max = 255, message = "Slack username is too long"))]
    pub slack_username: Option<String>,
    pub need_mentoring: Option<bool>,
    pub available_to_mentor: Option<bool>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.name.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.occupation.is_none()
            && self.organization.is_none()
            && self.slack_username.is_none()
            && self.need_mentoring.is_none()
            && self.available_to_mentor.is_none()
    }
}

/// Change password request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(
        length(min = 8, max = 64, message = "Password must be between 8 and 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

/// Profile fields visible to any authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub organization: Option<String>,
    pub slack_username: Option<String>,
    pub need_mentoring: bool,
    pub available_to_mentor: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            occupation: user.occupation.clone(),
            organization: user.organization.clone(),
            slack_username: user.slack_username.clone(),
            need_mentoring: user.need_mentoring,
            available_to_mentor: user.available_to_mentor,
        }
    }
}

/// The caller's own profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullUser {
    #[serde(flatten)]
    pub profile: PublicUser,
    pub email: String,
    pub is_email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for FullUser {
    fn from(user: &User) -> Self {
        Self {
            profile: PublicUser::from(user),
            email: user.email.clone(),
            is_email_verified: user.is_email_verified,
            email_verified_at: user.email_verified_at,
            created_at: user.created_at,
        }
    }
}

/// Home screen statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeStatistics {
    pub name: String,
    pub pending_requests: i64,
    pub accepted_requests: i64,
    pub rejected_requests: i64,
    pub completed_relations: i64,
    pub cancelled_relations: i64,
}

impl HomeStatistics {
    pub fn new(name: String, counts: RelationCounts) -> Self {
        Self {
            name,
            pending_requests: counts.pending,
            accepted_requests: counts.accepted,
            rejected_requests: counts.rejected,
            completed_relations: counts.completed,
            cancelled_relations: counts.cancelled,
        }
    }
}

/// Plain message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
