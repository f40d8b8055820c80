//! API Routes
//!
//! HTTP endpoint definitions. Handlers stay thin: deserialize, consult the
//! authorization policy, delegate to a service, shape the response.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::domain::{Paginated, TransactionStatus};
use crate::error::AppError;
use crate::policy::{is_allowed, Operation};
use crate::services::{
    AccountService, AdminAuthResponse, AuthResponse, AuthService, AuthTokens, Client,
    ClientService, CreateAccount, CreateClient, CreateNetwork, CreateTransaction,
    MobileMoneyAccount, Network, NetworkService, NetworkStats, TransactionDetail,
    TransactionFilters, TransactionService, TransactionStats, UpdateAccount, UpdateClient,
    UpdateNetwork,
};

use super::middleware::{self, CurrentUser};
use super::AppState;

const ADMIN_REQUIRED: &str = "Accès refusé - Admin requis";

// =========================================================================
// Request types
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSearchQuery {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FreeSearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

// =========================================================================
// Router
// =========================================================================

/// Assemble the full application router
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/login", post(register_user))
        .route("/auth/register/admin", post(register_admin))
        .route("/auth/login/admin", post(login_admin))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password));

    let protected = Router::new()
        .route("/auth/change-password", patch(change_password))
        .route(
            "/transactions",
            post(create_transaction).get(list_transactions),
        )
        .route("/transactions/my-transactions", get(my_transactions))
        .route("/transactions/stats", get(transaction_stats))
        .route("/transactions/clients/search", get(search_transaction_clients))
        .route("/transactions/admin/all", get(admin_list_transactions))
        .route("/transactions/admin/stats", get(admin_transaction_stats))
        .route("/transactions/user/:user_id", get(transactions_by_user))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/status", patch(update_transaction_status))
        .route("/clients", post(create_client).get(list_clients))
        .route("/clients/search", get(search_clients))
        .route(
            "/clients/:id",
            get(get_client).patch(update_client).delete(delete_client),
        )
        .route("/networks", post(create_network).get(list_networks))
        .route(
            "/networks/:id",
            get(get_network)
                .patch(update_network)
                .delete(delete_network),
        )
        .route("/networks/:id/stats", get(network_stats))
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/me", get(my_accounts))
        .route(
            "/accounts/:id",
            get(get_account)
                .patch(update_account)
                .delete(delete_account),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", public.merge(protected))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Suggestion count for the client phone search: defaults to 5, clamped so
/// the bound LIMIT is always valid
fn suggestion_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(5).clamp(1, 100)
}

// =========================================================================
// Auth endpoints
// =========================================================================

/// Phone-only register-or-login
async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    let response = auth.register_user(&request.phone_number).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register a back-office admin
async fn register_admin(
    State(state): State<AppState>,
    Json(request): Json<crate::services::RegisterAdmin>,
) -> Result<(StatusCode, Json<AdminAuthResponse>), AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    let response = auth.register_admin(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Email+password admin login
async fn login_admin(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<AdminAuthResponse>, AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    let response = auth.login_admin(&request.email, &request.password).await?;
    Ok(Json(response))
}

/// Rotate the token pair from a refresh token
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<AuthTokens>, AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    let tokens = auth.refresh_token(&request.token).await?;
    Ok(Json(tokens))
}

/// Change the caller's password
async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    auth.change_password(
        current.id,
        &request.current_password,
        &request.new_password,
    )
    .await?;
    Ok(StatusCode::OK)
}

/// Request a password-reset token
async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    auth.forgot_password(&request.email).await?;
    Ok(StatusCode::OK)
}

/// Consume a reset token and set a new password
async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let auth = AuthService::new(state.pool.clone(), state.tokens.clone());
    auth.reset_password(&request.token, &request.new_password)
        .await?;
    Ok(StatusCode::OK)
}

// =========================================================================
// Transaction endpoints
// =========================================================================

/// Create a transaction for the caller
async fn create_transaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateTransaction>,
) -> Result<(StatusCode, Json<TransactionDetail>), AppError> {
    let service = TransactionService::new(state.pool.clone());
    let detail = service.create(current.id, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Filtered listing. Admins may scope to any user; everyone else only
/// sees their own transactions.
async fn list_transactions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<Paginated<TransactionDetail>>, AppError> {
    let scope = if is_allowed(current.role, Operation::ListAllTransactions) {
        filters.user_id
    } else {
        Some(current.id)
    };

    let service = TransactionService::new(state.pool.clone());
    let page = service.find_all_with_filters(scope, &filters).await?;
    Ok(Json(page))
}

/// The caller's own transactions
async fn my_transactions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<Paginated<TransactionDetail>>, AppError> {
    let service = TransactionService::new(state.pool.clone());
    let page = service
        .find_all_with_filters(Some(current.id), &filters)
        .await?;
    Ok(Json(page))
}

/// Statistics scoped like the listing
async fn transaction_stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<TransactionStats>, AppError> {
    let scope = if is_allowed(current.role, Operation::ViewGlobalStats) {
        filters.user_id
    } else {
        Some(current.id)
    };

    let service = TransactionService::new(state.pool.clone());
    let stats = service.get_transaction_stats(scope, &filters).await?;
    Ok(Json(stats))
}

/// Client suggestions by phone-number fragment
async fn search_transaction_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientSearchQuery>,
) -> Result<Json<Vec<crate::domain::ClientSummary>>, AppError> {
    let phone_number = query.phone_number.as_deref().ok_or_else(|| {
        AppError::Validation("Le numéro de téléphone est requis pour la recherche".to_string())
    })?;
    let limit = suggestion_limit(query.limit);

    let service = TransactionService::new(state.pool.clone());
    let clients = service.search_clients_by_phone(phone_number, limit).await?;
    Ok(Json(clients))
}

/// Single transaction, scoped to the owner for plain users
async fn get_transaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<TransactionDetail>, AppError> {
    let service = TransactionService::new(state.pool.clone());
    let detail = service.find_one(id, current.role, current.id).await?;
    Ok(Json(detail))
}

/// Overwrite a transaction's status (admin only)
async fn update_transaction_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TransactionDetail>, AppError> {
    if !is_allowed(current.role, Operation::UpdateTransactionStatus) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = TransactionService::new(state.pool.clone());
    let detail = service.update_status(id, request.status).await?;
    Ok(Json(detail))
}

/// All transactions across users (admin only)
async fn admin_list_transactions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<Paginated<TransactionDetail>>, AppError> {
    if !is_allowed(current.role, Operation::ListAllTransactions) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = TransactionService::new(state.pool.clone());
    let page = service.find_all_with_filters(None, &filters).await?;
    Ok(Json(page))
}

/// Global statistics (admin only)
async fn admin_transaction_stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<TransactionStats>, AppError> {
    if !is_allowed(current.role, Operation::ViewGlobalStats) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = TransactionService::new(state.pool.clone());
    let stats = service.get_transaction_stats(None, &filters).await?;
    Ok(Json(stats))
}

/// Transactions of one specific user (admin only)
async fn transactions_by_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Query(filters): Query<TransactionFilters>,
) -> Result<Json<Paginated<TransactionDetail>>, AppError> {
    if !is_allowed(current.role, Operation::ViewUserTransactions) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = TransactionService::new(state.pool.clone());
    let page = service.find_all_with_filters(Some(user_id), &filters).await?;
    Ok(Json(page))
}

// =========================================================================
// Client endpoints
// =========================================================================

async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClient>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let service = ClientService::new(state.pool.clone());
    let client = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, AppError> {
    let service = ClientService::new(state.pool.clone());
    Ok(Json(service.find_all().await?))
}

async fn search_clients(
    State(state): State<AppState>,
    Query(query): Query<FreeSearchQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    let q = query.q.as_deref().ok_or_else(|| {
        AppError::Validation("Le paramètre de recherche est requis".to_string())
    })?;

    let service = ClientService::new(state.pool.clone());
    Ok(Json(service.search(q).await?))
}

async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Client>, AppError> {
    let service = ClientService::new(state.pool.clone());
    Ok(Json(service.find_one(id).await?))
}

async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateClient>,
) -> Result<Json<Client>, AppError> {
    let service = ClientService::new(state.pool.clone());
    Ok(Json(service.update(id, request).await?))
}

async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let service = ClientService::new(state.pool.clone());
    service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Network endpoints
// =========================================================================

async fn create_network(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateNetwork>,
) -> Result<(StatusCode, Json<Network>), AppError> {
    if !is_allowed(current.role, Operation::ManageNetworks) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = NetworkService::new(state.pool.clone());
    let network = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(network)))
}

async fn list_networks(State(state): State<AppState>) -> Result<Json<Vec<Network>>, AppError> {
    let service = NetworkService::new(state.pool.clone());
    Ok(Json(service.find_all().await?))
}

async fn get_network(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Network>, AppError> {
    let service = NetworkService::new(state.pool.clone());
    Ok(Json(service.find_one(id).await?))
}

async fn update_network(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateNetwork>,
) -> Result<Json<Network>, AppError> {
    if !is_allowed(current.role, Operation::ManageNetworks) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = NetworkService::new(state.pool.clone());
    Ok(Json(service.update(id, request).await?))
}

async fn delete_network(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !is_allowed(current.role, Operation::ManageNetworks) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = NetworkService::new(state.pool.clone());
    service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn network_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NetworkStats>, AppError> {
    let service = NetworkService::new(state.pool.clone());
    Ok(Json(service.stats(id).await?))
}

// =========================================================================
// Mobile-money account endpoints
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateAccount>,
) -> Result<(StatusCode, Json<MobileMoneyAccount>), AppError> {
    let service = AccountService::new(state.pool.clone());
    let account = service.create(current.id, request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<MobileMoneyAccount>>, AppError> {
    if !is_allowed(current.role, Operation::ListAllAccounts) {
        return Err(AppError::Forbidden(ADMIN_REQUIRED.to_string()));
    }

    let service = AccountService::new(state.pool.clone());
    Ok(Json(service.find_all().await?))
}

async fn my_accounts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<MobileMoneyAccount>>, AppError> {
    let service = AccountService::new(state.pool.clone());
    Ok(Json(service.find_by_user(current.id).await?))
}

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MobileMoneyAccount>, AppError> {
    let service = AccountService::new(state.pool.clone());
    Ok(Json(service.find_one(id).await?))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAccount>,
) -> Result<Json<MobileMoneyAccount>, AppError> {
    let service = AccountService::new(state.pool.clone());
    Ok(Json(service.update(id, request).await?))
}

async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let service = AccountService::new(state.pool.clone());
    service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_deserialize() {
        let request: RegisterRequest =
            serde_json::from_str(r#"{"phoneNumber": "0700000001"}"#).unwrap();
        assert_eq!(request.phone_number, "0700000001");
    }

    #[test]
    fn test_change_password_request_deserialize() {
        let json = r#"{"currentPassword": "old", "newPassword": "new"}"#;
        let request: ChangePasswordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.current_password, "old");
        assert_eq!(request.new_password, "new");
    }

    #[test]
    fn test_update_status_request_deserialize() {
        let request: UpdateStatusRequest =
            serde_json::from_str(r#"{"status": "COMPLETED"}"#).unwrap();
        assert_eq!(request.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_update_status_request_rejects_unknown_status() {
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status": "CANCELLED"}"#).is_err());
    }

    #[test]
    fn test_client_search_query_defaults() {
        let query: ClientSearchQuery = serde_json::from_str("{}").unwrap();
        assert!(query.phone_number.is_none());
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_suggestion_limit_clamps() {
        assert_eq!(suggestion_limit(None), 5);
        assert_eq!(suggestion_limit(Some(10)), 10);
        assert_eq!(suggestion_limit(Some(0)), 1);
        assert_eq!(suggestion_limit(Some(-1)), 1);
        assert_eq!(suggestion_limit(Some(1000)), 100);
    }
}
