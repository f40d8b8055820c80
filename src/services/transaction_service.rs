//! Transaction service
//!
//! Transaction creation with conditional client/account resolution, the
//! filtered paginated listing, aggregate statistics and the admin status
//! update. Creation runs inside a single database transaction so a failure
//! leaves no partial client/account rows behind; unique constraints are the
//! backstop against concurrent duplicate creation.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::domain::{
    clamp_page, clamp_size, ClientSummary, NetworkSummary, Paginated, PaginationMeta,
    TransactionStatus, UserRole, UserSummary,
};
use crate::error::{AppError, AppResult};

/// Sortable columns, keyed by their API names
const SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "t.created_at"),
    ("amount", "t.amount"),
    ("status", "t.status"),
    ("updatedAt", "t.updated_at"),
];

/// Transaction creation input. Either `client_id` or `phone_number` must be
/// present; `phone_number_user` is only needed when the caller has no
/// mobile-money account on the target network yet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    pub amount: Decimal,
    pub network_id: i64,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_user: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Multi-criteria filter for listings and statistics
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub network_id: Option<i64>,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Transaction joined with its client/network/user summaries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub id: i64,
    pub user_id: i64,
    pub client_id: i64,
    pub amount: Decimal,
    pub network_id: i64,
    pub mobile_money_account_id: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client: ClientSummary,
    pub network: NetworkSummary,
    pub user: UserSummary,
}

/// Aggregate statistics over a filter scope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total_transactions: i64,
    pub completed_transactions: i64,
    pub pending_transactions: i64,
    pub failed_transactions: i64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub success_rate: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionJoinedRow {
    id: i64,
    user_id: i64,
    client_id: i64,
    amount: Decimal,
    network_id: i64,
    mobile_money_account_id: i64,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    client_first_name: Option<String>,
    client_last_name: Option<String>,
    client_phone_number: String,
    client_email: Option<String>,
    network_name: String,
    network_image: Option<String>,
    user_first_name: Option<String>,
    user_last_name: Option<String>,
    user_phone_number: String,
}

impl From<TransactionJoinedRow> for TransactionDetail {
    fn from(row: TransactionJoinedRow) -> Self {
        TransactionDetail {
            id: row.id,
            user_id: row.user_id,
            client_id: row.client_id,
            amount: row.amount,
            network_id: row.network_id,
            mobile_money_account_id: row.mobile_money_account_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            client: ClientSummary {
                id: row.client_id,
                first_name: row.client_first_name,
                last_name: row.client_last_name,
                phone_number: row.client_phone_number,
                email: row.client_email,
            },
            network: NetworkSummary {
                id: row.network_id,
                name: row.network_name,
                image: row.network_image,
            },
            user: UserSummary {
                id: row.user_id,
                first_name: row.user_first_name,
                last_name: row.user_last_name,
                phone_number: row.user_phone_number,
            },
        }
    }
}

const JOINED_SELECT: &str = r#"
SELECT t.id, t.user_id, t.client_id, t.amount, t.network_id, t.mobile_money_account_id,
       t.status, t.created_at, t.updated_at,
       c.first_name AS client_first_name, c.last_name AS client_last_name,
       c.phone_number AS client_phone_number, c.email AS client_email,
       n.name AS network_name, n.image AS network_image,
       u.first_name AS user_first_name, u.last_name AS user_last_name,
       u.phone_number AS user_phone_number
FROM transactions t
JOIN clients c ON c.id = t.client_id
JOIN networks n ON n.id = t.network_id
JOIN users u ON u.id = t.user_id
WHERE 1=1"#;

/// Transaction creation, querying and statistics
pub struct TransactionService {
    pool: PgPool,
}

impl TransactionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a transaction, resolving or auto-creating the counterparty
    /// client and the caller's mobile-money account on the target network.
    pub async fn create(
        &self,
        user_id: i64,
        input: CreateTransaction,
    ) -> AppResult<TransactionDetail> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Le montant doit être un nombre positif".to_string(),
            ));
        }

        if input.client_id.is_none() && input.phone_number.is_none() {
            return Err(AppError::Validation(
                "Vous devez fournir soit un ID client soit un numéro de téléphone".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let client_id = if input.phone_number.is_some() {
            find_or_create_client(&mut tx, &input).await?
        } else {
            let client_id = input.client_id.unwrap_or_default();
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1)")
                    .bind(client_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound("Client non trouvé".to_string()));
            }
            client_id
        };

        let network_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM networks WHERE id = $1)")
                .bind(input.network_id)
                .fetch_one(&mut *tx)
                .await?;
        if !network_exists {
            return Err(AppError::NotFound("Réseau non trouvé".to_string()));
        }

        let account_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM mobile_money_accounts WHERE user_id = $1 AND network_id = $2",
        )
        .bind(user_id)
        .bind(input.network_id)
        .fetch_optional(&mut *tx)
        .await?;

        let account_id = match account_id {
            Some(id) => id,
            None => {
                let phone_number_user = input.phone_number_user.as_deref().ok_or_else(|| {
                    AppError::Validation(
                        "Le numéro de téléphone de l'utilisateur est requis pour créer un compte mobile money"
                            .to_string(),
                    )
                })?;

                sqlx::query_scalar(
                    r#"
                    INSERT INTO mobile_money_accounts (user_id, network_id, phone_number)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(user_id)
                .bind(input.network_id)
                .bind(phone_number_user)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let transaction_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (user_id, client_id, amount, network_id, mobile_money_account_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(input.amount)
        .bind(input.network_id)
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            transaction_id,
            user_id,
            client_id,
            network_id = input.network_id,
            "Transaction created"
        );

        self.fetch_detail(transaction_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Transaction {} vanished after insert", transaction_id))
        })
    }

    /// Filtered, sorted, paginated listing. `user_id` scopes the query to
    /// one owner when present; admins pass `None` to see everything.
    pub async fn find_all_with_filters(
        &self,
        user_id: Option<i64>,
        filters: &TransactionFilters,
    ) -> AppResult<Paginated<TransactionDetail>> {
        let page = clamp_page(filters.page);
        let size = clamp_size(filters.size);
        let offset = page_offset(page, size);

        let (sort_column, sort_direction) =
            order_clause(filters.sort_by.as_deref(), filters.sort_order.as_deref());

        let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
        push_filters(&mut qb, user_id, filters, filters.status, true);
        qb.push(format!(" ORDER BY {} {}", sort_column, sort_direction));
        qb.push(" LIMIT ");
        qb.push_bind(size);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows: Vec<TransactionJoinedRow> =
            qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions t WHERE 1=1");
        push_filters(&mut count_qb, user_id, filters, filters.status, true);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Paginated {
            data: rows.into_iter().map(TransactionDetail::from).collect(),
            pagination: PaginationMeta::new(total, page, size),
        })
    }

    /// Counts by status plus sum/average over completed transactions within
    /// the filter scope. Amount-range filters do not apply here.
    pub async fn get_transaction_stats(
        &self,
        user_id: Option<i64>,
        filters: &TransactionFilters,
    ) -> AppResult<TransactionStats> {
        let total = self.count_scoped(user_id, filters, filters.status).await?;
        let completed = self
            .count_scoped(user_id, filters, Some(TransactionStatus::Completed))
            .await?;
        let pending = self
            .count_scoped(user_id, filters, Some(TransactionStatus::Pending))
            .await?;
        let failed = self
            .count_scoped(user_id, filters, Some(TransactionStatus::Failed))
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COALESCE(SUM(t.amount), 0), AVG(t.amount) FROM transactions t WHERE 1=1",
        );
        push_filters(
            &mut qb,
            user_id,
            filters,
            Some(TransactionStatus::Completed),
            false,
        );
        let (total_amount, average_amount): (Decimal, Option<Decimal>) =
            qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(TransactionStats {
            total_transactions: total,
            completed_transactions: completed,
            pending_transactions: pending,
            failed_transactions: failed,
            total_amount,
            average_amount: average_amount.unwrap_or(Decimal::ZERO),
            success_rate: success_rate(completed, total),
        })
    }

    /// Single transaction lookup. Plain users only see their own rows.
    pub async fn find_one(
        &self,
        id: i64,
        role: UserRole,
        user_id: i64,
    ) -> AppResult<TransactionDetail> {
        let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
        qb.push(" AND t.id = ");
        qb.push_bind(id);
        if role == UserRole::User {
            qb.push(" AND t.user_id = ");
            qb.push_bind(user_id);
        }

        let row: Option<TransactionJoinedRow> =
            qb.build_query_as().fetch_optional(&self.pool).await?;

        row.map(TransactionDetail::from)
            .ok_or_else(|| AppError::NotFound("Transaction non trouvée".to_string()))
    }

    /// Overwrite a transaction's status. Any status may replace any other;
    /// there is no transition guard, so repeating a status is a no-op
    /// success rather than an error.
    pub async fn update_status(
        &self,
        id: i64,
        status: TransactionStatus,
    ) -> AppResult<TransactionDetail> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM transactions WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Transaction non trouvée".to_string()));
        }

        sqlx::query("UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.fetch_detail(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction non trouvée".to_string()))
    }

    /// Substring match on client phone numbers, most recent first
    pub async fn search_clients_by_phone(
        &self,
        phone_number: &str,
        limit: i64,
    ) -> AppResult<Vec<ClientSummary>> {
        let rows: Vec<ClientSummary> = sqlx::query_as::<
            _,
            (i64, Option<String>, Option<String>, String, Option<String>),
        >(
            r#"
            SELECT id, first_name, last_name, phone_number, email
            FROM clients
            WHERE phone_number LIKE $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(format!("%{}%", phone_number))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(
            |(id, first_name, last_name, phone_number, email)| ClientSummary {
                id,
                first_name,
                last_name,
                phone_number,
                email,
            },
        )
        .collect();

        Ok(rows)
    }

    async fn fetch_detail(&self, id: i64) -> AppResult<Option<TransactionDetail>> {
        let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
        qb.push(" AND t.id = ");
        qb.push_bind(id);

        let row: Option<TransactionJoinedRow> =
            qb.build_query_as().fetch_optional(&self.pool).await?;
        Ok(row.map(TransactionDetail::from))
    }

    async fn count_scoped(
        &self,
        user_id: Option<i64>,
        filters: &TransactionFilters,
        status: Option<TransactionStatus>,
    ) -> AppResult<i64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions t WHERE 1=1");
        push_filters(&mut qb, user_id, filters, status, false);
        let count = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// Resolve a client by exact phone number, creating one when absent.
/// Runs inside the creation transaction so a later failure rolls it back.
async fn find_or_create_client(
    tx: &mut Transaction<'_, Postgres>,
    input: &CreateTransaction,
) -> AppResult<i64> {
    let phone_number = input.phone_number.as_deref().unwrap_or_default();

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM clients WHERE phone_number = $1")
        .bind(phone_number)
        .fetch_optional(&mut **tx)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    if let Some(email) = input.email.as_deref() {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE email = $1)")
            .bind(email)
            .fetch_one(&mut **tx)
            .await?;
        if taken {
            return Err(AppError::Validation(
                "Un client avec cet email existe déjà".to_string(),
            ));
        }
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO clients (phone_number, first_name, last_name, email)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(phone_number)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Append conjunctive filter clauses to a query ending in `WHERE 1=1`
fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Option<i64>,
    filters: &TransactionFilters,
    status: Option<TransactionStatus>,
    include_amount_range: bool,
) {
    if let Some(user_id) = user_id {
        qb.push(" AND t.user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(status) = status {
        qb.push(" AND t.status = ");
        qb.push_bind(status);
    }
    if let Some(client_id) = filters.client_id {
        qb.push(" AND t.client_id = ");
        qb.push_bind(client_id);
    }
    if let Some(network_id) = filters.network_id {
        qb.push(" AND t.network_id = ");
        qb.push_bind(network_id);
    }
    if include_amount_range {
        if let Some(min_amount) = filters.min_amount {
            qb.push(" AND t.amount >= ");
            qb.push_bind(min_amount);
        }
        if let Some(max_amount) = filters.max_amount {
            qb.push(" AND t.amount <= ");
            qb.push_bind(max_amount);
        }
    }
    if let Some(start_date) = filters.start_date {
        qb.push(" AND t.created_at >= ");
        qb.push_bind(day_start(start_date));
    }
    if let Some(end_date) = filters.end_date {
        qb.push(" AND t.created_at <= ");
        qb.push_bind(day_end(end_date));
    }
}

/// Resolve the ORDER BY column and direction. Unknown sort fields fall back
/// to `created_at DESC` regardless of the requested direction.
fn order_clause(sort_by: Option<&str>, sort_order: Option<&str>) -> (&'static str, &'static str) {
    let column = sort_by.and_then(|requested| {
        SORT_FIELDS
            .iter()
            .find(|(name, _)| *name == requested)
            .map(|(_, column)| *column)
    });

    match column {
        Some(column) => {
            let direction = match sort_order {
                Some("asc") => "ASC",
                _ => "DESC",
            };
            (column, direction)
        }
        None => ("t.created_at", "DESC"),
    }
}

/// OFFSET for a 1-based page. Saturates so an absurd page number yields an
/// empty page instead of overflowing the multiply.
fn page_offset(page: i64, size: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(size)
}

/// completed/total as a percentage, 0 when the scope is empty
fn success_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let completed = completed.to_f64().unwrap_or(0.0);
    let total = total.to_f64().unwrap_or(1.0);
    (completed / total) * 100.0
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Inclusive end of day, so an end-date filter covers the whole day
fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + Duration::days(1) - Duration::milliseconds(1)
}
