/// Email verification state of an account
///
/// `Unverified -> Verified` is the only transition and it never reverses.
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Unverified,
    Verified,
}

impl AccountState {
    pub fn from_verified_flag(is_email_verified: bool) -> Self {
        if is_email_verified {
            AccountState::Verified
        } else {
            AccountState::Unverified
        }
    }

    /// Apply an email confirmation
    pub fn confirm(self) -> ApiResult<AccountState> {
        match self {
            AccountState::Unverified => Ok(AccountState::Verified),
            AccountState::Verified => Err(ApiError::AlreadyConfirmed),
        }
    }

    /// Login is only allowed once the email is confirmed
    pub fn ensure_can_login(self) -> ApiResult<()> {
        match self {
            AccountState::Verified => Ok(()),
            AccountState::Unverified => Err(ApiError::EmailNotVerified),
        }
    }

    /// A verification email can only be resent while unverified
    pub fn ensure_can_resend_verification(self) -> ApiResult<()> {
        match self {
            AccountState::Unverified => Ok(()),
            AccountState::Verified => Err(ApiError::AlreadyVerified),
        }
    }
}
