//! Client service
//!
//! CRUD over transaction counterparties. Phone and email uniqueness are
//! checked before writes; the unique indexes remain the backstop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Client row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClient {
    pub phone_number: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClient {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

const CLIENT_COLUMNS: &str =
    "id, phone_number, first_name, last_name, email, created_at, updated_at";

pub struct ClientService {
    pool: PgPool,
}

impl ClientService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateClient) -> AppResult<Client> {
        let phone_taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE phone_number = $1)")
                .bind(&input.phone_number)
                .fetch_one(&self.pool)
                .await?;
        if phone_taken {
            return Err(AppError::Conflict(
                "Un client avec ce numéro de téléphone existe déjà".to_string(),
            ));
        }

        if let Some(email) = input.email.as_deref() {
            self.ensure_email_free(email).await?;
        }

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (phone_number, first_name, last_name, email)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&input.phone_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn find_all(&self) -> AppResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients ORDER BY created_at DESC",
            CLIENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    pub async fn find_one(&self, id: i64) -> AppResult<Client> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE id = $1",
            CLIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        client.ok_or_else(|| AppError::NotFound(format!("Client avec l'ID {} non trouvé", id)))
    }

    pub async fn update(&self, id: i64, input: UpdateClient) -> AppResult<Client> {
        let client = self.find_one(id).await?;

        if let Some(phone_number) = input.phone_number.as_deref() {
            if phone_number != client.phone_number {
                let taken: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM clients WHERE phone_number = $1)",
                )
                .bind(phone_number)
                .fetch_one(&self.pool)
                .await?;
                if taken {
                    return Err(AppError::Conflict(
                        "Un client avec ce numéro de téléphone existe déjà".to_string(),
                    ));
                }
            }
        }

        if let Some(email) = input.email.as_deref() {
            if Some(email) != client.email.as_deref() {
                self.ensure_email_free(email).await?;
            }
        }

        let updated = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET phone_number = COALESCE($1, phone_number),
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&input.phone_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Delete a client. Rejected while transactions still reference it.
    pub async fn remove(&self, id: i64) -> AppResult<()> {
        self.find_one(id).await?;

        let transaction_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE client_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if transaction_count > 0 {
            return Err(AppError::Conflict(
                "Impossible de supprimer un client ayant des transactions".to_string(),
            ));
        }

        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Free-text search across name, phone and email
    pub async fn search(&self, query: &str) -> AppResult<Vec<Client>> {
        let pattern = format!("%{}%", query);
        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {}
            FROM clients
            WHERE first_name ILIKE $1
               OR last_name ILIKE $1
               OR phone_number LIKE $1
               OR email ILIKE $1
            ORDER BY created_at DESC
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn ensure_email_free(&self, email: &str) -> AppResult<()> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        if taken {
            return Err(AppError::Conflict(
                "Un client avec cet email existe déjà".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_deserialize() {
        let json = r#"{"phoneNumber": "0700000001", "firstName": "Awa"}"#;
        let input: CreateClient = serde_json::from_str(json).unwrap();
        assert_eq!(input.phone_number, "0700000001");
        assert_eq!(input.first_name.as_deref(), Some("Awa"));
        assert!(input.email.is_none());
    }

    #[test]
    fn test_update_client_all_fields_optional() {
        let input: UpdateClient = serde_json::from_str("{}").unwrap();
        assert!(input.phone_number.is_none());
        assert!(input.email.is_none());
    }
}
