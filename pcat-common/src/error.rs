//! Error type shared by the catalog crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable config file or unusable root folder
    #[error("Configuration error: {0}")]
    Config(String),

    /// Field value the catalog cannot accept (unknown kind, overflowing sku)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dimension pair that cannot be classified (zero, negative or non-finite)
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
}
