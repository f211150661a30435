//! Transaction types for PaySentry
//!
//! A transaction is the canonical in-memory record of one proposed agent
//! payment as it moves through policy evaluation, execution and settlement.
//! The control plane owns these records; payment backends only ever see
//! their own protocol-native payloads.

use crate::TransactionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Payment protocol a transaction travels over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProtocol {
    /// HTTP-402 style micropayment (x402)
    X402,
    /// Agent commerce protocol checkout
    AgentCommerce,
    /// Agent-to-agent mandated transfer
    AgentMandate,
    /// Card rails
    Card,
    /// Caller-defined protocol
    Custom,
}

impl fmt::Display for PaymentProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::X402 => "x402",
            Self::AgentCommerce => "agent_commerce",
            Self::AgentMandate => "agent_mandate",
            Self::Card => "card",
            Self::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Proposed, awaiting a policy decision
    Pending,
    /// Policy allowed (or approval granted)
    Approved,
    /// Policy denied
    Rejected,
    /// Handed to a payment backend
    Executing,
    /// Settled successfully
    Completed,
    /// Settlement failed
    Failed,
    /// A dispute case is open against this transaction
    Disputed,
    /// Funds returned to the agent
    Refunded,
}

impl TransactionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Refunded)
    }

    /// Check whether moving to `next` is an edge of the lifecycle graph.
    ///
    /// `completed` is re-enterable from `disputed` (a denied resolution),
    /// which is why it is not listed as terminal.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Completed, Disputed)
                | (Completed, Refunded)
                | (Failed, Disputed)
                | (Disputed, Refunded)
                | (Disputed, Completed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// A payment transaction tracked by the control plane
///
/// Invariants: `amount` is strictly positive, `created_at <= updated_at`,
/// and `metadata` is frozen after construction. Status mutations go through
/// [`Transaction::mark`] so `updated_at` is always stamped alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: TransactionId,
    /// Agent that initiated the payment
    pub agent_id: String,
    /// Recipient: URI, address or merchant handle, opaque to the core
    pub recipient: String,
    /// Payment amount (strictly positive)
    pub amount: Decimal,
    /// Currency code, opaque to the core
    pub currency: String,
    /// Free-text purpose
    pub purpose: String,
    /// Protocol the payment travels over
    pub protocol: PaymentProtocol,
    /// Current lifecycle status
    pub status: TransactionStatus,
    /// Optional service tag
    pub service_id: Option<String>,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
    /// When the transaction was last updated
    pub updated_at: DateTime<Utc>,
    /// Protocol-native transaction id, set after settlement
    pub protocol_tx_id: Option<String>,
    /// Frozen metadata map
    metadata: HashMap<String, String>,
}

impl Transaction {
    /// Create a new pending transaction
    pub fn new(
        agent_id: impl Into<String>,
        recipient: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        purpose: impl Into<String>,
        protocol: PaymentProtocol,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            agent_id: agent_id.into(),
            recipient: recipient.into(),
            amount,
            currency: currency.into(),
            purpose: purpose.into(),
            protocol,
            status: TransactionStatus::Pending,
            service_id: None,
            created_at: now,
            updated_at: now,
            protocol_tx_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the service tag
    pub fn with_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Set the metadata map (only available at construction time)
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Read-only view of the metadata map
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Look up a single metadata value
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Move to a new status, stamping `updated_at`
    pub fn mark(&mut self, status: TransactionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record the protocol-native transaction id, stamping `updated_at`
    pub fn set_protocol_tx_id(&mut self, tx_id: impl Into<String>) {
        self.protocol_tx_id = Some(tx_id.into());
        self.updated_at = Utc::now();
    }

    /// Check if the transaction settled successfully
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Filter for querying transactions from the spend ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Filter by initiating agent
    pub agent_id: Option<String>,
    /// Filter by recipient
    pub recipient: Option<String>,
    /// Filter by service tag
    pub service_id: Option<String>,
    /// Filter by protocol
    pub protocol: Option<PaymentProtocol>,
    /// Filter by status
    pub status: Option<TransactionStatus>,
    /// Filter by currency
    pub currency: Option<String>,
    /// Minimum amount (inclusive)
    pub min_amount: Option<Decimal>,
    /// Maximum amount (inclusive)
    pub max_amount: Option<Decimal>,
    /// Created strictly after this instant
    pub after: Option<DateTime<Utc>>,
    /// Created strictly before this instant
    pub before: Option<DateTime<Utc>>,
    /// Limit results
    pub limit: Option<usize>,
}
