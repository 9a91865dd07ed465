// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String), // e.g., from bincode
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings parse error: {0}")]
    Parse(String), // from toml::de
    #[error("Settings serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed backup document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),
    #[error("Storage error during restore: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN must be exactly {expected} digits (got {actual})")]
    WrongLength { expected: usize, actual: usize },
    #[error("PIN may only contain digits")]
    NonDigit,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
    #[error("Invalid PIN: {0}")]
    Pin(#[from] PinError),
    #[error("App is locked: {0}")]
    Locked(String),
    #[error("CLI error: {0}")]
    Cli(String),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type SettingsResult<T> = Result<T, SettingsError>;
pub type BackupResult<T> = Result<T, BackupError>;
