//! Error taxonomy for the order-management services.

use store::{OrderStatus, StoreError};
use thiserror::Error;

/// Accumulated input violations, reported together rather than one at a
/// time so the caller can fix everything in a single resubmission.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Creates an empty violation list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a violation.
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Returns true if no violations were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the recorded violation messages.
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Converts the list into a `Validation` error unless it is empty.
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PurchasingError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

/// Errors that can occur during order-management operations.
#[derive(Debug, Error)]
pub enum PurchasingError {
    /// Input failed validation; every violation found is listed.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// The order's current status does not permit the operation.
    #[error("Cannot {action} an order in {status} state")]
    InvalidState {
        status: OrderStatus,
        action: &'static str,
    },

    /// The backing store failed; the transaction was rolled back.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audit snapshot serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PurchasingError {
    /// Builds a `NotFound` error for an entity kind and id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for order-management operations.
pub type Result<T> = std::result::Result<T, PurchasingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_violations_convert_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn violations_are_all_reported() {
        let mut violations = ValidationErrors::new();
        violations.push("quantity must be greater than zero");
        violations.push("unit cost must be greater than zero");

        let err = violations.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("quantity must be greater than zero"));
        assert!(message.contains("unit cost must be greater than zero"));
    }

    #[test]
    fn invalid_state_names_status_and_action() {
        let err = PurchasingError::InvalidState {
            status: OrderStatus::Completed,
            action: "modify",
        };
        assert_eq!(err.to_string(), "Cannot modify an order in completed state");
    }
}
