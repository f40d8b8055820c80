//! Auth service
//!
//! Registration, login, credential rotation and the password-reset flow.
//! Two login flows exist: phone-only app users (no password) and
//! email+password back-office admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::UserRole;
use crate::error::{AppError, AppResult};
use crate::mail;

use super::token_service::TokenService;

/// bcrypt work factor used for every stored password
const BCRYPT_COST: u32 = 10;

/// User row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub phone_number: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Access/refresh token pair issued on every successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Minimal projection returned to app users
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserProfile {
    pub id: i64,
    pub phone_number: String,
    pub user_type: UserRole,
}

/// Projection returned to admins
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_type: UserRole,
    pub phone_number: Option<String>,
}

/// Tokens plus the app-user projection
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    pub user: AppUserProfile,
}

/// Tokens plus the admin projection
#[derive(Debug, Clone, Serialize)]
pub struct AdminAuthResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    pub user: AdminProfile,
}

/// Admin registration input
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAdmin {
    pub email: String,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub phone_number: String,
    #[serde(default)]
    pub user_type: Option<UserRole>,
}

/// Registration, login and password lifecycle
pub struct AuthService {
    pool: PgPool,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(pool: PgPool, tokens: TokenService) -> Self {
        Self { pool, tokens }
    }

    /// Phone-only register-or-login flow.
    ///
    /// An existing USER with the same phone number is logged in rather than
    /// duplicated; an existing non-USER is a conflict.
    pub async fn register_user(&self, phone_number: &str) -> AppResult<AuthResponse> {
        if let Some(existing) = self.find_by_phone(phone_number).await? {
            if existing.role != UserRole::User {
                return Err(AppError::Conflict(
                    "User already exists with this phone number".to_string(),
                ));
            }

            let tokens = self.generate_tokens(&existing)?;
            return Ok(AuthResponse {
                tokens,
                user: AppUserProfile {
                    id: existing.id,
                    phone_number: existing.phone_number,
                    user_type: UserRole::User,
                },
            });
        }

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (phone_number, role)
            VALUES ($1, $2)
            RETURNING id, phone_number, email, password, first_name, last_name, role,
                      created_at, updated_at
            "#,
        )
        .bind(phone_number)
        .bind(UserRole::User)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = user.id, "User created");

        let tokens = self.generate_tokens(&user)?;
        Ok(AuthResponse {
            tokens,
            user: AppUserProfile {
                id: user.id,
                phone_number: user.phone_number,
                user_type: UserRole::User,
            },
        })
    }

    /// Email+password admin registration
    pub async fn register_admin(&self, input: RegisterAdmin) -> AppResult<AdminAuthResponse> {
        let user_type = input.user_type.unwrap_or(UserRole::Admin);

        if user_type != UserRole::Admin {
            return Err(AppError::Validation("User type must be ADMIN".to_string()));
        }

        if self.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password = input
            .password
            .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

        let hashed = hash_password(&password)?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (email, password, first_name, last_name, phone_number, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, phone_number, email, password, first_name, last_name, role,
                      created_at, updated_at
            "#,
        )
        .bind(&input.email)
        .bind(&hashed)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone_number)
        .bind(user_type)
        .fetch_one(&self.pool)
        .await?;

        let tokens = self.generate_tokens(&user)?;
        Ok(AdminAuthResponse {
            tokens,
            user: admin_profile(user),
        })
    }

    /// Email+password login, restricted to admin-class roles
    pub async fn login_admin(&self, email: &str, password: &str) -> AppResult<AdminAuthResponse> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        let stored = user.password.as_deref().ok_or_else(|| {
            AppError::Unauthorized("User does not have a password set".to_string())
        })?;

        if !verify_password(password, stored)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        if !user.role.is_admin_class() {
            return Err(AppError::Unauthorized("Only admins can log in".to_string()));
        }

        let tokens = self.generate_tokens(&user)?;
        Ok(AdminAuthResponse {
            tokens,
            user: admin_profile(user),
        })
    }

    /// Change the caller's password.
    ///
    /// When no password is set yet, the current password is not checked; any
    /// new password is accepted. Legacy behavior for phone-only users being
    /// promoted, kept as observed.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        if let Some(stored) = user.password.as_deref() {
            if !verify_password(current_password, stored)? {
                return Err(AppError::Unauthorized(
                    "Current password is incorrect".to_string(),
                ));
            }
        }

        let hashed = hash_password(new_password)?;
        self.store_password(user_id, &hashed).await
    }

    /// Issue a password-reset token for the given email.
    ///
    /// An unknown email is an error even though the message reads as a
    /// silent success; this mirrors the observed behavior rather than the
    /// message text.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let user = self.find_by_email(email).await?.ok_or_else(|| {
            AppError::Validation(
                "If your email is registered, you will receive a password reset link".to_string(),
            )
        })?;

        let token = self
            .tokens
            .issue_reset_token(&user)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        mail::send_password_reset(email, &token);
        Ok(())
    }

    /// Consume a reset token and store the new password
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let invalid = || AppError::Validation("Invalid or expired token".to_string());

        let claims = self.tokens.verify(token).map_err(|_| invalid())?;

        let user = self.find_by_id(claims.sub).await?.ok_or_else(invalid)?;

        let hashed = hash_password(new_password)?;
        self.store_password(user.id, &hashed).await
    }

    /// Rotate tokens from a refresh token. The presented token stays valid
    /// until it expires; there is no revocation list.
    pub async fn refresh_token(&self, token: &str) -> AppResult<AuthTokens> {
        let invalid = || AppError::Unauthorized("Invalid or expired refresh token".to_string());

        let claims = self.tokens.verify(token).map_err(|_| invalid())?;

        let user = self.find_by_id(claims.sub).await?.ok_or_else(invalid)?;

        self.generate_tokens(&user)
    }

    fn generate_tokens(&self, user: &User) -> AppResult<AuthTokens> {
        let access_token = self
            .tokens
            .issue_access_token(user)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let refresh_token = self
            .tokens
            .issue_refresh_token(user)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    async fn store_password(&self, user_id: i64, hashed: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(hashed)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password, first_name, last_name, role,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_phone(&self, phone_number: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password, first_name, last_name, role,
                   created_at, updated_at
            FROM users
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone_number, email, password, first_name, last_name, role,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

fn admin_profile(user: User) -> AdminProfile {
    AdminProfile {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        user_type: user.role,
        phone_number: Some(user.phone_number),
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AppError::Internal(e.to_string()))
}

fn verify_password(password: &str, hashed: &str) -> AppResult<bool> {
    bcrypt::verify(password, hashed).map_err(|e| AppError::Internal(e.to_string()))
}
