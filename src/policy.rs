//! Authorization policy
//!
//! Explicit role/operation matrix consulted by the HTTP handlers. Replaces
//! ad-hoc per-route role checks with a single decision function.

use crate::domain::UserRole;

/// Privileged operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// List transactions across all users
    ListAllTransactions,
    /// View aggregate statistics across all users
    ViewGlobalStats,
    /// List transactions belonging to an arbitrary user
    ViewUserTransactions,
    /// Overwrite a transaction's status
    UpdateTransactionStatus,
    /// Create/update/delete networks (reference data)
    ManageNetworks,
    /// List all mobile-money accounts
    ListAllAccounts,
}

/// Whether `role` may perform `operation`
pub fn is_allowed(role: UserRole, operation: Operation) -> bool {
    match operation {
        Operation::ListAllTransactions
        | Operation::ViewGlobalStats
        | Operation::ViewUserTransactions
        | Operation::UpdateTransactionStatus
        | Operation::ManageNetworks
        | Operation::ListAllAccounts => role.is_admin_class(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPERATIONS: &[Operation] = &[
        Operation::ListAllTransactions,
        Operation::ViewGlobalStats,
        Operation::ViewUserTransactions,
        Operation::UpdateTransactionStatus,
        Operation::ManageNetworks,
        Operation::ListAllAccounts,
    ];

    #[test]
    fn test_plain_user_denied_everywhere() {
        for op in ALL_OPERATIONS {
            assert!(!is_allowed(UserRole::User, *op), "USER allowed for {:?}", op);
        }
    }

    #[test]
    fn test_admin_class_allowed() {
        for op in ALL_OPERATIONS {
            assert!(is_allowed(UserRole::Admin, *op));
            assert!(is_allowed(UserRole::SubAdmin, *op));
        }
    }
}
