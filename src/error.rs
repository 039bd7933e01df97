//! Error types shared by the registry, the optimizer and the persistence layer.

use thiserror::Error;

/// Rejection of a proposed pack size configuration.
///
/// Every variant is recoverable: the caller has to resubmit corrected input,
/// the previously active configuration stays in effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pack sizes must not be empty")]
    Empty,
    #[error("invalid pack size: {0}")]
    Invalid(String),
    #[error("smallest pack size {smallest} exceeds the supported limit of {limit}")]
    SmallestTooLarge { smallest: u64, limit: u64 },
}

/// Failure of a single calculation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizerError {
    #[error("item quantity {0} is out of range (must be between 1 and {max})", max = crate::model::MAX_ORDER_QUANTITY)]
    InvalidQuantity(u64),
    /// Unreachable through the registry, which never holds an empty snapshot.
    #[error("no pack sizes are configured")]
    EmptyConfiguration,
}

impl OptimizerError {
    /// Whether the error was caused by caller input rather than broken internal state.
    pub fn is_user_error(&self) -> bool {
        matches!(self, OptimizerError::InvalidQuantity(_))
    }
}

/// Failure while reading or writing the persisted configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents could not be (de)serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("stored configuration is invalid: {0}")]
    Config(#[from] ConfigError),
}

/// Errors surfaced by the service operations to the transport layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_quantity_message_names_bounds() {
        let message = OptimizerError::InvalidQuantity(0).to_string();
        assert!(message.contains("between 1 and"), "unexpected message: {message}");
    }

    #[test]
    fn only_quantity_errors_are_user_errors() {
        assert!(OptimizerError::InvalidQuantity(0).is_user_error());
        assert!(!OptimizerError::EmptyConfiguration.is_user_error());
    }

    #[test]
    fn config_errors_convert_into_service_errors() {
        let err: ServiceError = ConfigError::Empty.into();
        assert!(matches!(err, ServiceError::Config(ConfigError::Empty)));
        assert_eq!(err.to_string(), "pack sizes must not be empty");
    }
}
