//! Student Housing Library
//!
//! Room assignment, application lifecycle and registration binding engines
//! over a per-document atomic store. Re-exports modules for integration
//! testing and the server binary.

pub mod api;
pub mod domain;
pub mod engine;
pub mod jobs;
pub mod notify;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::{Config, StoreBackend};
pub use domain::{DomainError, OperationContext};
pub use engine::Engines;
pub use error::{AppError, AppResult, ErrorResponse};
