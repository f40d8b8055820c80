//! API Middleware
//!
//! Bearer-token authentication and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::domain::UserRole;
use crate::error::AppError;

use super::AppState;

/// Authenticated caller, extracted from the access token claims
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub role: UserRole,
}

// =========================================================================
// Bearer-token authentication
// =========================================================================

/// Validate the `Authorization: Bearer` token and attach the caller to the
/// request. Token verification is purely cryptographic; no revocation list
/// is consulted.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            return Err(
                AppError::Unauthorized("Missing bearer token".to_string()).into_response(),
            );
        }
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(_) => {
            return Err(
                AppError::Unauthorized("Invalid or expired token".to_string()).into_response(),
            );
        }
    };

    request.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        role: claims.user_type.unwrap_or(UserRole::User),
    });

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

// =========================================================================
// Header masking
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
