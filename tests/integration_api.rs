//! API Integration Tests
//!
//! Exercise the router surface that does not need a live database: health,
//! authentication rejection, authorization checks and request validation.
//! The pool is created lazily, so no connection is attempted until a
//! handler actually runs a query.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::util::ServiceExt;

use momo_backoffice::api::{self, AppState};
use momo_backoffice::domain::UserRole;
use momo_backoffice::services::{TokenService, User};
use momo_backoffice::Config;

fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost:1/unused".to_string(),
        database_max_connections: 1,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        jwt_access_expiration: 900,
        jwt_refresh_expiration: 604_800,
        jwt_reset_password_expiration: 3_600,
    }
}

fn test_app(config: &Config) -> axum::Router {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    api::create_router(AppState::new(pool, config))
}

fn access_token(config: &Config, role: UserRole) -> String {
    let tokens = TokenService::new(config);
    let user = User {
        id: 7,
        phone_number: "0700000007".to_string(),
        email: Some("user@example.com".to_string()),
        password: None,
        first_name: None,
        last_name: None,
        role,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    tokens.issue_access_token(&user).expect("token")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let config = test_config();
    let app = test_app(&config);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let config = test_config();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["message"], "Missing bearer token");
}

#[tokio::test]
async fn test_protected_route_rejects_garbage_token() {
    let config = test_config();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions")
                .header("Authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_protected_route_rejects_token_from_other_secret() {
    let config = test_config();
    let app = test_app(&config);

    let other = Config {
        jwt_secret: "some-other-secret".to_string(),
        ..test_config()
    };
    let token = access_token(&other, UserRole::User);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_listing_forbidden_for_plain_user() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::User);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions/admin/all")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["statusCode"], 403);
    assert_eq!(body["message"], "Accès refusé - Admin requis");
}

#[tokio::test]
async fn test_admin_stats_forbidden_for_plain_user() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::User);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions/admin/stats")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_status_update_forbidden_for_plain_user() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::User);

    let response = app
        .oneshot(
            Request::patch("/api/v1/transactions/1/status")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status": "COMPLETED"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_network_mutation_forbidden_for_plain_user() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::User);

    let response = app
        .oneshot(
            Request::post("/api/v1/networks")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name": "Orange Money"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_client_suggestion_search_requires_phone_number() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::Admin);

    let response = app
        .oneshot(
            Request::get("/api/v1/transactions/clients/search")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Le numéro de téléphone est requis pour la recherche"
    );
}

#[tokio::test]
async fn test_client_search_requires_query() {
    let config = test_config();
    let app = test_app(&config);
    let token = access_token(&config, UserRole::Admin);

    let response = app
        .oneshot(
            Request::get("/api/v1/clients/search")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_with_garbage_token_unauthorized() {
    let config = test_config();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::post("/api/v1/auth/refresh-token")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"token": "bogus"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired refresh token");
}

#[tokio::test]
async fn test_reset_with_garbage_token_rejected() {
    let config = test_config();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::post("/api/v1/auth/reset-password")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"token": "bogus", "newPassword": "hunter2"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired token");
}
