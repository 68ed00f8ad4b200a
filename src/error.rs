use thiserror::Error;

/// Errors returned by the directory core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active subscription for client {0}")]
    NotSubscribed(String),
}

impl DirectoryError {
    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            DirectoryError::InvalidRegion(_) => "invalid_region",
            DirectoryError::InvalidRecord(_) => "invalid_record",
            DirectoryError::NotFound(_) => "not_found",
            DirectoryError::NotSubscribed(_) => "not_subscribed",
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
