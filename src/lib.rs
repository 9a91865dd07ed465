//! acctkeep: a local credential manager with PIN app lock and JSON backups.

pub mod backup;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod lock;
pub mod models;
pub mod observable;
pub mod settings;
pub mod store;

pub use error::{AppError, AppResult};
pub use models::AccountRecord;
pub use store::RecordStore;
