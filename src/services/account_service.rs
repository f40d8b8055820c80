//! Mobile-money account service
//!
//! CRUD over user wallets. One account per (user, network) pair; the
//! service checks before inserting and the unique index backstops races.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::{NetworkSummary, UserSummary};
use crate::error::{AppError, AppResult};

/// Account joined with its user and network summaries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileMoneyAccount {
    pub id: i64,
    pub phone_number: String,
    pub user_id: i64,
    pub network_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserSummary,
    pub network: NetworkSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    pub phone_number: String,
    pub network_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccount {
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountJoinedRow {
    id: i64,
    phone_number: String,
    user_id: i64,
    network_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_first_name: Option<String>,
    user_last_name: Option<String>,
    user_phone_number: String,
    network_name: String,
    network_image: Option<String>,
}

impl From<AccountJoinedRow> for MobileMoneyAccount {
    fn from(row: AccountJoinedRow) -> Self {
        MobileMoneyAccount {
            id: row.id,
            phone_number: row.phone_number,
            user_id: row.user_id,
            network_id: row.network_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user: UserSummary {
                id: row.user_id,
                first_name: row.user_first_name,
                last_name: row.user_last_name,
                phone_number: row.user_phone_number,
            },
            network: NetworkSummary {
                id: row.network_id,
                name: row.network_name,
                image: row.network_image,
            },
        }
    }
}

const JOINED_SELECT: &str = r#"
SELECT a.id, a.phone_number, a.user_id, a.network_id, a.created_at, a.updated_at,
       u.first_name AS user_first_name, u.last_name AS user_last_name,
       u.phone_number AS user_phone_number,
       n.name AS network_name, n.image AS network_image
FROM mobile_money_accounts a
JOIN users u ON u.id = a.user_id
JOIN networks n ON n.id = a.network_id"#;

pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, input: CreateAccount) -> AppResult<MobileMoneyAccount> {
        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound("Utilisateur non trouvé".to_string()));
        }

        let network_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM networks WHERE id = $1)")
                .bind(input.network_id)
                .fetch_one(&self.pool)
                .await?;
        if !network_exists {
            return Err(AppError::NotFound("Réseau non trouvé".to_string()));
        }

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM mobile_money_accounts WHERE user_id = $1 AND network_id = $2)",
        )
        .bind(user_id)
        .bind(input.network_id)
        .fetch_one(&self.pool)
        .await?;
        if duplicate {
            return Err(AppError::Conflict(
                "Un compte Mobile Money existe déjà pour cet utilisateur".to_string(),
            ));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO mobile_money_accounts (user_id, network_id, phone_number)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.network_id)
        .bind(&input.phone_number)
        .fetch_one(&self.pool)
        .await?;

        self.find_one(id).await
    }

    pub async fn find_all(&self) -> AppResult<Vec<MobileMoneyAccount>> {
        let rows: Vec<AccountJoinedRow> =
            sqlx::query_as(&format!("{} ORDER BY a.created_at DESC", JOINED_SELECT))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(MobileMoneyAccount::from).collect())
    }

    pub async fn find_one(&self, id: i64) -> AppResult<MobileMoneyAccount> {
        let row: Option<AccountJoinedRow> =
            sqlx::query_as(&format!("{} WHERE a.id = $1", JOINED_SELECT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(MobileMoneyAccount::from).ok_or_else(|| {
            AppError::NotFound(format!("Compte Mobile Money avec l'ID {} non trouvé", id))
        })
    }

    /// All accounts owned by the caller
    pub async fn find_by_user(&self, user_id: i64) -> AppResult<Vec<MobileMoneyAccount>> {
        let rows: Vec<AccountJoinedRow> = sqlx::query_as(&format!(
            "{} WHERE a.user_id = $1 ORDER BY a.created_at DESC",
            JOINED_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MobileMoneyAccount::from).collect())
    }

    pub async fn update(&self, id: i64, input: UpdateAccount) -> AppResult<MobileMoneyAccount> {
        self.find_one(id).await?;

        sqlx::query(
            r#"
            UPDATE mobile_money_accounts
            SET phone_number = COALESCE($1, phone_number),
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(&input.phone_number)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_one(id).await
    }

    /// Delete an account. Rejected while transactions still reference it.
    pub async fn remove(&self, id: i64) -> AppResult<()> {
        self.find_one(id).await?;

        let transaction_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE mobile_money_account_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        if transaction_count > 0 {
            return Err(AppError::Conflict(
                "Impossible de supprimer un compte Mobile Money ayant des transactions".to_string(),
            ));
        }

        sqlx::query("DELETE FROM mobile_money_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account_deserialize() {
        let json = r#"{"phoneNumber": "0711111111", "networkId": 2}"#;
        let input: CreateAccount = serde_json::from_str(json).unwrap();
        assert_eq!(input.phone_number, "0711111111");
        assert_eq!(input.network_id, 2);
    }
}
