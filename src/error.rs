//! Error types for pool management.

use crate::store::StoreError;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors returned by the pool registry and allocators.
///
/// Every variant except `Storage` is detected before any ledger mutation.
/// `Storage` is returned after the in-memory change has been rolled back.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pool '{0}' not found")]
    PoolNotFound(String),

    #[error("Allocation '{identifier}' not found in pool '{pool}'")]
    AllocationNotFound { pool: String, identifier: String },

    #[error("Pool with name '{0}' already exists")]
    Conflict(String),

    #[error("Pool '{pool}' has no available {request}")]
    Exhausted { pool: String, request: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PoolError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        PoolError::Validation(msg.into())
    }

    /// True for errors caused by the caller's input rather than pool state
    pub fn is_validation(&self) -> bool {
        matches!(self, PoolError::Validation(_))
    }

    /// True for both missing pools and missing allocations
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PoolError::PoolNotFound(_) | PoolError::AllocationNotFound { .. }
        )
    }
}

impl From<ipnet::AddrParseError> for PoolError {
    fn from(e: ipnet::AddrParseError) -> Self {
        PoolError::Validation(format!("Invalid CIDR notation: {}", e))
    }
}

impl From<ipnet::PrefixLenError> for PoolError {
    fn from(e: ipnet::PrefixLenError) -> Self {
        PoolError::Validation(e.to_string())
    }
}
