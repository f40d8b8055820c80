//! momo_backoffice Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod domain;
pub mod mail;
pub mod policy;
pub mod services;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
