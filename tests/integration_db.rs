//! DB-backed Integration Tests
//!
//! End-to-end coverage of the flows that need a live database: the
//! register-or-login identity, transaction creation with client and account
//! auto-creation, and the status update. Each test skips silently when
//! DATABASE_URL is not configured or the schema is missing; data is keyed
//! by unique phone numbers so no table truncation is needed.

mod common;

use momo_backoffice::domain::TransactionStatus;
use momo_backoffice::services::{AuthService, CreateTransaction, TransactionService};
use momo_backoffice::AppError;
use rust_decimal_macros::dec;

fn create_input(network_id: i64, client_phone: &str, user_phone: &str) -> CreateTransaction {
    CreateTransaction {
        amount: dec!(1500.50),
        network_id,
        client_id: None,
        phone_number: Some(client_phone.to_string()),
        phone_number_user: Some(user_phone.to_string()),
        first_name: Some("Jean".to_string()),
        last_name: None,
        email: None,
    }
}

#[tokio::test]
async fn test_register_user_returns_same_identity_per_phone() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let auth = AuthService::new(pool.clone(), common::test_tokens());
    let phone = common::unique_phone("07");

    let first = auth.register_user(&phone).await.unwrap();
    let second = auth.register_user(&phone).await.unwrap();

    assert_eq!(first.user.id, second.user.id);
    assert_eq!(second.user.phone_number, phone);
    assert!(!second.tokens.access_token.is_empty());
}

#[tokio::test]
async fn test_create_transaction_auto_creates_client_and_account() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let auth = AuthService::new(pool.clone(), common::test_tokens());
    let caller = auth
        .register_user(&common::unique_phone("07"))
        .await
        .unwrap();
    let network_id = common::seed_network(&pool).await;
    let service = TransactionService::new(pool.clone());

    let client_phone = common::unique_phone("06");
    let wallet_phone = common::unique_phone("05");
    let input = create_input(network_id, &client_phone, &wallet_phone);

    let detail = service.create(caller.user.id, input.clone()).await.unwrap();

    assert_eq!(detail.user_id, caller.user.id);
    assert_eq!(detail.status, TransactionStatus::Pending);
    assert_eq!(detail.client.phone_number, client_phone);
    assert_eq!(detail.client.first_name.as_deref(), Some("Jean"));
    assert_eq!(detail.network.id, network_id);

    // A second transaction to the same counterparty reuses both the client
    // and the caller's account on that network
    let again = service
        .create(
            caller.user.id,
            CreateTransaction {
                amount: dec!(10),
                ..input
            },
        )
        .await
        .unwrap();

    assert_eq!(again.client_id, detail.client_id);
    assert_eq!(
        again.mobile_money_account_id,
        detail.mobile_money_account_id
    );
}

#[tokio::test]
async fn test_create_transaction_rejects_dangling_client_id() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let auth = AuthService::new(pool.clone(), common::test_tokens());
    let caller = auth
        .register_user(&common::unique_phone("07"))
        .await
        .unwrap();
    let network_id = common::seed_network(&pool).await;
    let service = TransactionService::new(pool.clone());

    let err = service
        .create(
            caller.user.id,
            CreateTransaction {
                amount: dec!(100),
                network_id,
                client_id: Some(i64::MAX),
                phone_number: None,
                phone_number_user: None,
                first_name: None,
                last_name: None,
                email: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        AppError::NotFound(message) => assert_eq!(message, "Client non trouvé"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_update_status_reapply_is_a_noop_success() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let auth = AuthService::new(pool.clone(), common::test_tokens());
    let caller = auth
        .register_user(&common::unique_phone("07"))
        .await
        .unwrap();
    let network_id = common::seed_network(&pool).await;
    let service = TransactionService::new(pool.clone());

    let detail = service
        .create(
            caller.user.id,
            create_input(
                network_id,
                &common::unique_phone("06"),
                &common::unique_phone("05"),
            ),
        )
        .await
        .unwrap();
    assert_eq!(detail.status, TransactionStatus::Pending);

    let updated = service
        .update_status(detail.id, TransactionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Completed);

    let reapplied = service
        .update_status(detail.id, TransactionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(reapplied.status, TransactionStatus::Completed);
}
