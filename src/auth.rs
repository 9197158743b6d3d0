/// Authentication extractors
use crate::{context::AppContext, error::ApiError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

/// Authenticated caller, resolved from a bearer access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthorized("Missing or malformed authorization header".to_string())
                })?;

        // Any decode failure is reported as 401 here, not as InvalidToken
        let user_id = state
            .accounts
            .tokens()
            .decode_access_token(bearer.token())
            .map_err(|e| {
                tracing::debug!("Rejected access token: {}", e);
                ApiError::Unauthorized("Invalid or expired access token".to_string())
            })?;

        Ok(AuthContext { user_id })
    }
}
