/// Signed, time-boxed tokens
///
/// Two kinds of HS256 JWT are issued here:
/// - access tokens, whose subject is the user id
/// - email verification tokens, whose subject is the email address
///
/// The codec only proves that a payload was issued with our secret and has
/// not expired. It knows nothing about accounts.
use crate::{
    config::{AuthConfig, MAX_TOKEN_TTL},
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    EmailVerification,
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub purpose: TokenPurpose,
}

/// Access token issued at login
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token encoder/decoder
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    verification_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("verification_ttl", &self.verification_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl: Duration, verification_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            verification_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::seconds(config.access_token_ttl.clamp(0, MAX_TOKEN_TTL)),
            Duration::seconds(config.verification_token_ttl.clamp(0, MAX_TOKEN_TTL)),
        )
    }

    /// Issue an access token for a user, valid for the configured TTL
    pub fn issue_access_token(&self, user_id: i64) -> ApiResult<AccessToken> {
        self.issue_access_token_at(user_id, Utc::now())
    }

    /// Issue an access token as if the current time were `now`
    pub fn issue_access_token_at(&self, user_id: i64, now: DateTime<Utc>) -> ApiResult<AccessToken> {
        let (token, exp) = self.sign(user_id.to_string(), TokenPurpose::Access, now, self.access_ttl)?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| ApiError::Internal("Token expiry out of range".to_string()))?;

        Ok(AccessToken { token, expires_at })
    }

    /// Issue an email verification token bound to an email address
    pub fn issue_verification_token(&self, email: &str) -> ApiResult<String> {
        self.issue_verification_token_at(email, Utc::now())
    }

    pub fn issue_verification_token_at(&self, email: &str, now: DateTime<Utc>) -> ApiResult<String> {
        self.sign(
            email.to_string(),
            TokenPurpose::EmailVerification,
            now,
            self.verification_ttl,
        )
        .map(|(token, _)| token)
    }

    fn sign(
        &self,
        subject: String,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> ApiResult<(String, i64)> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject,
            iat,
            exp: iat + ttl.num_seconds(),
            jti: Uuid::new_v4().to_string(),
            purpose,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok((token, claims.exp))
    }

    /// Decode a token and check that it was issued for `purpose`
    ///
    /// Bad signature, malformed structure, expiry and purpose mismatch all
    /// fail with `InvalidToken`.
    pub fn decode(&self, token: &str, purpose: TokenPurpose) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            ApiError::InvalidToken
        })?;

        if data.claims.purpose != purpose {
            tracing::debug!(
                expected = ?purpose,
                actual = ?data.claims.purpose,
                "Token rejected: wrong purpose"
            );
            return Err(ApiError::InvalidToken);
        }

        Ok(data.claims)
    }

    /// Decode an access token into the user id it was issued for
    pub fn decode_access_token(&self, token: &str) -> ApiResult<i64> {
        let claims = self.decode(token, TokenPurpose::Access)?;
        claims.sub.parse().map_err(|_| ApiError::InvalidToken)
    }

    /// Decode a verification token into the email it was issued for
    pub fn decode_verification_token(&self, token: &str) -> ApiResult<String> {
        self.decode(token, TokenPurpose::EmailVerification)
            .map(|claims| claims.sub)
    }
}
