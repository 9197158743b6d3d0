/// Account manager implementation
///
/// Owns the authentication and account lifecycle rules: credential checks,
/// the verified-email gate, token issuance and the verification workflow.
/// Storage goes through [`UserStore`]; nothing here holds mutable state.

use crate::{
    account::{
        password, AccountState, ChangePasswordRequest, HomeStatistics, RegisterRequest,
        ResendEmailRequest, UpdateProfileRequest,
    },
    db::user::{NewUser, ProfileChanges, User, UserStore},
    error::{ApiError, ApiResult, FieldError},
    mailer::Mailer,
    metrics::{record_account_event, AccountEvent},
    token::{AccessToken, TokenCodec},
    validation::validate_request,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    users: UserStore,
    tokens: TokenCodec,
    mailer: Mailer,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(users: UserStore, tokens: TokenCodec, mailer: Mailer) -> Self {
        Self {
            users,
            tokens,
            mailer,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Check an identifier (username or email) and password
    ///
    /// Unknown identifier and wrong password both yield `InvalidCredentials`.
    /// Read-only.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> ApiResult<User> {
        // Usernames never contain '@'; emails are stored normalized
        let identifier = if identifier.contains('@') {
            normalize_email(identifier)
        } else {
            identifier.to_string()
        };

        match self.users.find_by_identifier(&identifier).await? {
            Some(user) => {
                if password::verify_password(password, &user.password_hash)? {
                    Ok(user)
                } else {
                    Err(ApiError::InvalidCredentials)
                }
            }
            None => {
                password::verify_dummy(password);
                Err(ApiError::InvalidCredentials)
            }
        }
    }

    /// Authenticate, enforce the verified gate, and issue an access token
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> ApiResult<AccessToken> {
        let username = username
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingField("username"))?;
        let password = password
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingField("password"))?;

        let user = match self.authenticate(username, password).await {
            Ok(user) => user,
            Err(e) => {
                if matches!(e, ApiError::InvalidCredentials) {
                    warn!("Login rejected: invalid credentials");
                    record_account_event(AccountEvent::LoginRejected);
                }
                return Err(e);
            }
        };

        if let Err(e) = AccountState::from_verified_flag(user.is_email_verified).ensure_can_login() {
            warn!(user_id = user.id, "Login rejected: email not verified");
            record_account_event(AccountEvent::LoginRejected);
            return Err(e);
        }

        let token = self.tokens.issue_access_token(user.id)?;
        record_account_event(AccountEvent::LoginSucceeded);
        info!(user_id = user.id, "User logged in");

        Ok(token)
    }

    /// Create an unverified account and dispatch its verification email
    pub async fn register(&self, req: RegisterRequest) -> ApiResult<User> {
        let req = RegisterRequest {
            username: req.username.trim().to_string(),
            email: normalize_email(&req.email),
            password: req.password,
            name: req
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };
        validate_request(&req)?;

        let name = match req.name {
            Some(name) => name,
            None => name_from_username(&req.username)?,
        };
        let username = req.username;
        let email = req.email;

        // Cheap pre-check; the UNIQUE constraints settle races
        if self.users.username_taken(&username, None).await?
            || self.users.email_taken(&email, None).await?
        {
            debug!("register: username or email already taken");
            return Err(ApiError::DuplicateAccount);
        }

        let password_hash = password::hash_password(&req.password)?;

        let user = self
            .users
            .insert(NewUser {
                username,
                email,
                password_hash,
                name,
            })
            .await?;

        record_account_event(AccountEvent::Registered);
        info!(user_id = user.id, username = %user.username, "Account created");

        self.dispatch_verification_email(&user);

        Ok(user)
    }

    /// Confirm an email with a verification token
    pub async fn confirm_email(&self, token: &str) -> ApiResult<User> {
        let email = self.tokens.decode_verification_token(token)?;

        // A token for an email no account holds any more proves nothing
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        AccountState::from_verified_flag(user.is_email_verified).confirm()?;

        let now = Utc::now();
        if !self.users.mark_email_verified(user.id, now).await? {
            return Err(ApiError::AlreadyConfirmed);
        }

        record_account_event(AccountEvent::EmailConfirmed);
        info!(user_id = user.id, "Email confirmed");

        Ok(User {
            is_email_verified: true,
            email_verified_at: Some(now),
            ..user
        })
    }

    /// Issue a fresh verification token and resend the email
    pub async fn resend_verification(&self, req: ResendEmailRequest) -> ApiResult<()> {
        let email = normalize_email(&req.email);
        validate_request(&ResendEmailRequest {
            email: email.clone(),
        })?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(ApiError::UnknownEmail)?;

        AccountState::from_verified_flag(user.is_email_verified)
            .ensure_can_resend_verification()?;

        self.dispatch_verification_email(&user);
        Ok(())
    }

    /// Send the verification email on a detached task
    ///
    /// Delivery is best-effort: the caller never waits for it and a failure
    /// is only logged and counted.
    fn dispatch_verification_email(&self, user: &User) {
        let token = match self.tokens.issue_verification_token(&user.email) {
            Ok(token) => token,
            Err(e) => {
                warn!(user_id = user.id, "Failed to issue verification token: {}", e);
                record_account_event(AccountEvent::VerificationEmailFailed);
                return;
            }
        };

        let mailer = self.mailer.clone();
        let user_id = user.id;
        let email = user.email.clone();
        let name = user.name.clone();

        tokio::spawn(async move {
            match mailer.send_verification_email(&email, &name, &token).await {
                Ok(()) => {
                    debug!(user_id, "Verification email dispatched");
                    record_account_event(AccountEvent::VerificationEmailSent);
                }
                Err(e) => {
                    warn!(user_id, "Failed to send verification email: {}", e);
                    record_account_event(AccountEvent::VerificationEmailFailed);
                }
            }
        });
    }

    /// Get user by id
    pub async fn get_user(&self, id: i64) -> ApiResult<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User".to_string()))
    }

    /// Update the caller's profile
    pub async fn update_profile(&self, id: i64, req: UpdateProfileRequest) -> ApiResult<User> {
        let req = UpdateProfileRequest {
            username: req.username.map(|u| u.trim().to_string()),
            email: req.email.as_deref().map(normalize_email),
            name: req.name.map(|n| n.trim().to_string()),
            ..req
        };
        validate_request(&req)?;

        if req.is_empty() {
            return Err(ApiError::Validation(vec![FieldError::new(
                "body",
                "No data for updating profile was sent",
            )]));
        }

        if let Some(ref username) = req.username {
            if self.users.username_taken(username, Some(id)).await? {
                return Err(ApiError::DuplicateAccount);
            }
        }
        if let Some(ref email) = req.email {
            if self.users.email_taken(email, Some(id)).await? {
                return Err(ApiError::DuplicateAccount);
            }
        }

        let changes = ProfileChanges {
            username: req.username,
            email: req.email,
            name: req.name,
            bio: req.bio,
            location: req.location,
            occupation: req.occupation,
            organization: req.organization,
            slack_username: req.slack_username,
            need_mentoring: req.need_mentoring,
            available_to_mentor: req.available_to_mentor,
        };

        if !self.users.update_profile(id, &changes).await? {
            return Err(ApiError::NotFound("User".to_string()));
        }

        info!(user_id = id, "Profile updated");
        self.get_user(id).await
    }

    /// Delete the caller's account
    pub async fn delete_account(&self, id: i64) -> ApiResult<()> {
        if !self.users.delete(id).await? {
            return Err(ApiError::NotFound("User".to_string()));
        }

        info!(user_id = id, "Account deleted");
        Ok(())
    }

    /// Change the caller's password after checking the current one
    pub async fn change_password(&self, id: i64, req: ChangePasswordRequest) -> ApiResult<()> {
        validate_request(&req)?;

        let user = self.get_user(id).await?;
        if !password::verify_password(&req.current_password, &user.password_hash)? {
            warn!(user_id = id, "Password change rejected: wrong current password");
            return Err(ApiError::IncorrectPassword);
        }

        let password_hash = password::hash_password(&req.new_password)?;
        if !self.users.update_password(id, &password_hash).await? {
            return Err(ApiError::NotFound("User".to_string()));
        }

        info!(user_id = id, "Password changed");
        Ok(())
    }

    /// List users other than the caller
    pub async fn list_users(&self, acting_id: i64, verified_only: bool) -> ApiResult<Vec<User>> {
        self.users.list(acting_id, verified_only).await
    }

    /// Relation statistics for the caller's home screen
    pub async fn home_statistics(&self, id: i64) -> ApiResult<HomeStatistics> {
        let user = self.get_user(id).await?;
        let counts = self.users.relation_counts(id).await?;

        Ok(HomeStatistics::new(user.name, counts))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Display name for a registration that omitted one
///
/// Underscores separate words and other non-letters are dropped, so the
/// result satisfies the name rules.
fn name_from_username(username: &str) -> ApiResult<String> {
    let words: Vec<String> = username
        .split('_')
        .map(|word| word.chars().filter(|c| c.is_ascii_alphabetic()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect();
    let name: String = words.join(" ").chars().take(30).collect();
    let name = name.trim_end().to_string();

    if name.len() < 2 {
        return Err(ApiError::Validation(vec![FieldError::new(
            "name",
            "Name is required when the username has fewer than 2 letters",
        )]));
    }

    Ok(name)
}
