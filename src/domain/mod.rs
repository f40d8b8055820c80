//! Domain module
//!
//! Core vocabulary shared across services: roles, transaction statuses,
//! pagination, and the joined entity summaries returned by read endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =========================================================================
// Roles
// =========================================================================

/// User roles. `User` is the phone-only app user; admin-class roles carry a
/// password and may access the back-office endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
    SubAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
            UserRole::SubAdmin => "SUB_ADMIN",
        }
    }

    /// Admin-class roles may log in to the back-office
    pub fn is_admin_class(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SubAdmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            "SUB_ADMIN" => Ok(UserRole::SubAdmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

// =========================================================================
// Transaction status
// =========================================================================

/// Transaction lifecycle status. Transitions are unrestricted: any status
/// may be overwritten by any other via the admin status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

// =========================================================================
// sqlx bindings (roles and statuses are stored as TEXT)
// =========================================================================

macro_rules! impl_text_column {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(text.parse::<$ty>()?)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

impl_text_column!(UserRole);
impl_text_column!(TransactionStatus);

// =========================================================================
// Pagination
// =========================================================================

/// Page size bounds enforced on every listing
pub const MIN_PAGE_SIZE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Clamp a requested page number into [1, ∞)
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Clamp a requested page size into [1, 100]
pub fn clamp_size(size: Option<i64>) -> i64 {
    size.unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Pagination metadata returned alongside every page of data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Derive metadata from a clamped page/size and the total row count
    pub fn new(total: i64, page: i64, size: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + size - 1) / size
        };
        Self {
            total,
            page,
            size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// A page of data plus its pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

// =========================================================================
// Joined entity summaries
// =========================================================================

/// Client projection embedded in transaction responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: String,
    pub email: Option<String>,
}

/// Network projection embedded in transaction and account responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
}

/// User projection embedded in transaction and account responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::User, UserRole::Admin, UserRole::SubAdmin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("SUPERUSER".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_admin_class() {
        assert!(!UserRole::User.is_admin_class());
        assert!(UserRole::Admin.is_admin_class());
        assert!(UserRole::SubAdmin.is_admin_class());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                status.as_str().parse::<TransactionStatus>().unwrap(),
                status
            );
        }
        assert!("CANCELLED".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_screaming_case() {
        let json = serde_json::to_string(&TransactionStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        let parsed: TransactionStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(parsed, TransactionStatus::Pending);
    }

    #[test]
    fn test_page_clamping() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(-5)), 1);
        assert_eq!(clamp_page(Some(7)), 7);
    }

    #[test]
    fn test_size_clamping() {
        assert_eq!(clamp_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_size(Some(0)), 1);
        assert_eq!(clamp_size(Some(-3)), 1);
        assert_eq!(clamp_size(Some(100)), 100);
        assert_eq!(clamp_size(Some(1000)), 100);
    }

    #[test]
    fn test_pagination_meta_consistency() {
        let meta = PaginationMeta::new(25, 2, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);

        let first = PaginationMeta::new(25, 1, 10);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = PaginationMeta::new(25, 3, 10);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn test_pagination_meta_empty() {
        let meta = PaginationMeta::new(0, 1, 10);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn test_pagination_meta_exact_division() {
        let meta = PaginationMeta::new(30, 3, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next);
    }
}
