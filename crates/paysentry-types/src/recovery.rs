//! Recovery types for PaySentry
//!
//! A recovery action returns funds to an agent after a dispute resolution
//! in their favor. Actions are queued and retried against an external
//! refund executor.

use crate::{DisputeId, RecoveryId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryType {
    /// Reverse the full settled amount
    FullRefund,
    /// Reverse part of the settled amount
    PartialRefund,
    /// Reversal through card rails
    Chargeback,
    /// New funds issued when the original transfer cannot be reversed
    Credit,
}

impl fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FullRefund => "full_refund",
            Self::PartialRefund => "partial_refund",
            Self::Chargeback => "chargeback",
            Self::Credit => "credit",
        };
        write!(f, "{}", s)
    }
}

/// Status of a recovery action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    /// Queued, not yet attempted
    Pending,
    /// Executor attempts in flight
    Processing,
    /// Funds returned
    Completed,
    /// All attempts exhausted
    Failed,
    /// Cancelled before processing
    Cancelled,
}

impl RecoveryStatus {
    /// Failed and cancelled actions are terminal; completed is too, but a
    /// completed recovery already returned the funds
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A queued, retryable refund operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAction {
    /// Recovery ID
    pub id: RecoveryId,
    /// Dispute that produced this action
    pub dispute_id: DisputeId,
    /// Transaction being refunded
    pub transaction_id: TransactionId,
    /// Agent receiving the funds
    pub agent_id: String,
    /// Kind of recovery
    pub recovery_type: RecoveryType,
    /// Amount to return
    pub amount: Decimal,
    /// Currency of the refund
    pub currency: String,
    /// Current status
    pub status: RecoveryStatus,
    /// When the action was created
    pub created_at: DateTime<Utc>,
    /// When the action last changed
    pub updated_at: DateTime<Utc>,
    /// When the refund completed
    pub completed_at: Option<DateTime<Utc>>,
    /// External refund transaction id, set on success
    pub refund_tx_id: Option<String>,
    /// Last executor error, set on failure
    pub error: Option<String>,
}

impl RecoveryAction {
    /// Move to a new status, stamping `updated_at`
    pub fn mark(&mut self, status: RecoveryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Result returned by an external refund executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    /// Whether the refund went through
    pub success: bool,
    /// External refund transaction id
    pub refund_tx_id: Option<String>,
    /// Error detail when not successful
    pub error: Option<String>,
}

impl RefundResult {
    /// A successful refund
    pub fn ok(refund_tx_id: impl Into<String>) -> Self {
        Self {
            success: true,
            refund_tx_id: Some(refund_tx_id.into()),
            error: None,
        }
    }

    /// A failed refund
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            refund_tx_id: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate recovery statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryStats {
    /// Total actions ever initiated
    pub total: usize,
    /// Actions by status name
    pub by_status: HashMap<String, usize>,
    /// Sum of completed refund amounts
    pub total_recovered: Decimal,
    /// Actions still waiting in the queue
    pub queued: usize,
}
