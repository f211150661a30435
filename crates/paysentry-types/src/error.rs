//! Error types for PaySentry
//!
//! Policy rejections are decisions, not errors, and never appear here.
//! Everything that *is* an error is explicit: invariant violations name the
//! offending id, and the breaker-open kind is distinguishable so callers can
//! tell degradation from failure.

use thiserror::Error;

/// Result type for PaySentry operations
pub type Result<T> = std::result::Result<T, PaySentryError>;

/// PaySentry error types
#[derive(Debug, Clone, Error)]
pub enum PaySentryError {
    // ========================================================================
    // Not-found
    // ========================================================================

    /// Transaction not found
    #[error("Transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    /// Dispute not found
    #[error("Dispute {dispute_id} not found")]
    DisputeNotFound { dispute_id: String },

    /// Recovery action not found
    #[error("Recovery action {recovery_id} not found")]
    RecoveryNotFound { recovery_id: String },

    // ========================================================================
    // Invariant violations
    // ========================================================================

    /// An open dispute already covers the transaction
    #[error("Active dispute {dispute_id} already exists for transaction {transaction_id}")]
    ActiveDisputeExists {
        transaction_id: String,
        dispute_id: String,
    },

    /// The dispute is closed and can no longer change
    #[error("Dispute {dispute_id} is closed and cannot be modified")]
    DisputeClosed { dispute_id: String },

    /// Recovery requires a refund-favoring resolution
    #[error("Dispute {dispute_id} is not resolved in favor of a refund (status: {status})")]
    DisputeNotRefundable { dispute_id: String, status: String },

    /// A non-terminal recovery already exists for the dispute
    #[error("Recovery {recovery_id} is already active for dispute {dispute_id}")]
    RecoveryAlreadyActive {
        dispute_id: String,
        recovery_id: String,
    },

    /// Only pending recoveries can be cancelled
    #[error("Recovery {recovery_id} cannot be cancelled (status: {status})")]
    RecoveryNotCancellable { recovery_id: String, status: String },

    /// The requested status change is not an edge of the lifecycle graph
    #[error("Transaction {transaction_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        transaction_id: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // Degradation and external failure
    // ========================================================================

    /// Circuit breaker is open for the target
    #[error("Circuit breaker open for {key}, retry in {remaining_ms}ms")]
    BreakerOpen { key: String, remaining_ms: i64 },

    /// The external facilitator raised
    #[error("Facilitator error: {message}")]
    Facilitator { message: String },

    /// Invalid input
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },
}

impl PaySentryError {
    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a facilitator error
    pub fn facilitator(message: impl Into<String>) -> Self {
        Self::Facilitator {
            message: message.into(),
        }
    }

    /// Check whether this is the breaker-open degradation signal
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::DisputeNotFound { .. } => "DISPUTE_NOT_FOUND",
            Self::RecoveryNotFound { .. } => "RECOVERY_NOT_FOUND",
            Self::ActiveDisputeExists { .. } => "ACTIVE_DISPUTE_EXISTS",
            Self::DisputeClosed { .. } => "DISPUTE_CLOSED",
            Self::DisputeNotRefundable { .. } => "DISPUTE_NOT_REFUNDABLE",
            Self::RecoveryAlreadyActive { .. } => "RECOVERY_ALREADY_ACTIVE",
            Self::RecoveryNotCancellable { .. } => "RECOVERY_NOT_CANCELLABLE",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::BreakerOpen { .. } => "BREAKER_OPEN",
            Self::Facilitator { .. } => "FACILITATOR_ERROR",
            Self::InvalidInput { .. } => "INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PaySentryError::ActiveDisputeExists {
            transaction_id: "ps_1".to_string(),
            dispute_id: "dsp_1".to_string(),
        };
        assert_eq!(err.error_code(), "ACTIVE_DISPUTE_EXISTS");
    }

    #[test]
    fn test_breaker_open_is_distinguishable() {
        let err = PaySentryError::BreakerOpen {
            key: "facilitator:settle".to_string(),
            remaining_ms: 2500,
        };
        assert!(err.is_breaker_open());
        assert!(err.to_string().contains("2500ms"));

        let other = PaySentryError::facilitator("boom");
        assert!(!other.is_breaker_open());
    }

    #[test]
    fn test_messages_name_the_offending_id() {
        let err = PaySentryError::DisputeClosed {
            dispute_id: "dsp_abc".to_string(),
        };
        assert!(err.to_string().contains("dsp_abc"));
    }
}
