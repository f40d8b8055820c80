//! Services module
//!
//! Business services backed by the persistence layer. Each service is
//! constructed per request from the shared pool, mirroring the request
//! lifecycle: no in-process mutable state is shared between requests.

mod account_service;
mod auth_service;
mod client_service;
mod network_service;
mod token_service;
mod transaction_service;

pub use account_service::{AccountService, CreateAccount, MobileMoneyAccount, UpdateAccount};
pub use auth_service::{
    AdminAuthResponse, AdminProfile, AppUserProfile, AuthResponse, AuthService, AuthTokens,
    RegisterAdmin, User,
};
pub use client_service::{Client, ClientService, CreateClient, UpdateClient};
pub use network_service::{CreateNetwork, Network, NetworkService, NetworkStats, UpdateNetwork};
pub use token_service::{Claims, InvalidToken, TokenService};
pub use transaction_service::{
    CreateTransaction, TransactionDetail, TransactionFilters, TransactionService, TransactionStats,
};
