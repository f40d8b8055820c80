//! Token service
//!
//! Signs and verifies the three token kinds (access, refresh, reset). All
//! kinds share one secret and differ only in lifetime and claim subset;
//! nothing in the payload marks the kind, so callers are responsible for
//! presenting the right token in the right place.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::UserRole;
use crate::Config;

use super::auth_service::User;

/// Signed token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "phoneNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<String>,
    #[serde(rename = "userType", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserRole>,
    pub iat: i64,
    pub exp: i64,
}

/// Verification failure. Signature and expiry problems are deliberately not
/// distinguished; callers surface a single "invalid or expired" message.
#[derive(Debug, thiserror::Error)]
#[error("invalid or expired token")]
pub struct InvalidToken;

/// Issues and verifies signed tokens
#[derive(Debug, Clone)]
pub struct TokenService {
    secret: String,
    access_ttl: i64,
    refresh_ttl: i64,
    reset_ttl: i64,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_ttl: config.jwt_access_expiration,
            refresh_ttl: config.jwt_refresh_expiration,
            reset_ttl: config.jwt_reset_password_expiration,
        }
    }

    /// Short-lived session token carrying the full claim set
    pub fn issue_access_token(&self, user: &User) -> Result<String, InvalidToken> {
        let claims = self.claims(user, self.access_ttl, true);
        self.sign(&claims)
    }

    /// Longer-lived renewal token: subject and email only
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, InvalidToken> {
        let claims = self.claims(user, self.refresh_ttl, false);
        self.sign(&claims)
    }

    /// One-off password-recovery token: subject and email only
    pub fn issue_reset_token(&self, user: &User) -> Result<String, InvalidToken> {
        let claims = self.claims(user, self.reset_ttl, false);
        self.sign(&claims)
    }

    /// Verify signature and expiry, returning the claims on success
    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| InvalidToken)
    }

    fn claims(&self, user: &User, ttl: i64, full: bool) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: user.id,
            email: user.email.clone(),
            phone_number: full.then(|| user.phone_number.clone()),
            user_type: full.then_some(user.role),
            iat: now,
            exp: now + ttl,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, InvalidToken> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| InvalidToken)
    }
}
