//! Network service
//!
//! CRUD over telecom operators (reference data). A network with dependent
//! accounts or transactions cannot be deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::TransactionStatus;
use crate::error::{AppError, AppResult};

/// Network row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNetwork {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNetwork {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Usage counters for one network
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub network: Network,
    pub mobile_money_accounts: i64,
    pub total_transactions: i64,
    pub total_amount: Decimal,
}

const NETWORK_COLUMNS: &str = "id, name, image, created_at, updated_at";

pub struct NetworkService {
    pool: PgPool,
}

impl NetworkService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateNetwork) -> AppResult<Network> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM networks WHERE name = $1)")
                .bind(&input.name)
                .fetch_one(&self.pool)
                .await?;
        if taken {
            return Err(AppError::Conflict(
                "Un réseau avec ce nom existe déjà".to_string(),
            ));
        }

        let network = sqlx::query_as::<_, Network>(&format!(
            "INSERT INTO networks (name, image) VALUES ($1, $2) RETURNING {}",
            NETWORK_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(network)
    }

    pub async fn find_all(&self) -> AppResult<Vec<Network>> {
        let networks = sqlx::query_as::<_, Network>(&format!(
            "SELECT {} FROM networks ORDER BY name ASC",
            NETWORK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(networks)
    }

    pub async fn find_one(&self, id: i64) -> AppResult<Network> {
        let network = sqlx::query_as::<_, Network>(&format!(
            "SELECT {} FROM networks WHERE id = $1",
            NETWORK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        network.ok_or_else(|| AppError::NotFound(format!("Réseau avec l'ID {} non trouvé", id)))
    }

    pub async fn update(&self, id: i64, input: UpdateNetwork) -> AppResult<Network> {
        let network = self.find_one(id).await?;

        if let Some(name) = input.name.as_deref() {
            if name != network.name {
                let taken: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM networks WHERE name = $1)")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?;
                if taken {
                    return Err(AppError::Conflict(
                        "Un réseau avec ce nom existe déjà".to_string(),
                    ));
                }
            }
        }

        let updated = sqlx::query_as::<_, Network>(&format!(
            r#"
            UPDATE networks
            SET name = COALESCE($1, name),
                image = COALESCE($2, image),
                updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            NETWORK_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.image)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Delete a network. Reference data is immutable once depended upon.
    pub async fn remove(&self, id: i64) -> AppResult<()> {
        self.find_one(id).await?;

        let account_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mobile_money_accounts WHERE network_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        let transaction_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE network_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if account_count > 0 || transaction_count > 0 {
            return Err(AppError::Conflict(
                "Impossible de supprimer un réseau ayant des comptes ou des transactions associés"
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM networks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn stats(&self, id: i64) -> AppResult<NetworkStats> {
        let network = self.find_one(id).await?;

        let mobile_money_accounts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mobile_money_accounts WHERE network_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        let total_transactions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE network_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        let total_amount: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE network_id = $1 AND status = $2",
        )
        .bind(id)
        .bind(TransactionStatus::Completed)
        .fetch_one(&self.pool)
        .await?;

        Ok(NetworkStats {
            network,
            mobile_money_accounts,
            total_transactions,
            total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_network_deserialize() {
        let input: CreateNetwork = serde_json::from_str(r#"{"name": "MTN"}"#).unwrap();
        assert_eq!(input.name, "MTN");
        assert!(input.image.is_none());
    }
}
