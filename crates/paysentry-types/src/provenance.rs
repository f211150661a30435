//! Provenance types for PaySentry
//!
//! Every transaction accumulates an append-only chain of stage records:
//! what happened, when, and with what outcome.

use crate::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a provenance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceStage {
    /// The agent declared intent to pay
    Intent,
    /// The policy engine evaluated the transaction
    PolicyCheck,
    /// An external approval decision was taken
    Approval,
    /// The payment was handed to a backend
    Execution,
    /// The backend reported a settlement result
    Settlement,
    /// A dispute was filed
    Dispute,
}

impl fmt::Display for ProvenanceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Intent => "intent",
            Self::PolicyCheck => "policy_check",
            Self::Approval => "approval",
            Self::Execution => "execution",
            Self::Settlement => "settlement",
            Self::Dispute => "dispute",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a provenance stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceOutcome {
    Pass,
    Fail,
    Pending,
}

/// One record in a transaction's provenance chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Transaction the record belongs to
    pub transaction_id: TransactionId,
    /// Lifecycle stage
    pub stage: ProvenanceStage,
    /// When the record was appended
    pub timestamp: DateTime<Utc>,
    /// Human-readable action
    pub action: String,
    /// Stage outcome
    pub outcome: ProvenanceOutcome,
    /// Stage-specific details, stored verbatim
    pub details: serde_json::Value,
}

impl ProvenanceRecord {
    /// Create a record stamped now
    pub fn new(
        transaction_id: TransactionId,
        stage: ProvenanceStage,
        action: impl Into<String>,
        outcome: ProvenanceOutcome,
        details: serde_json::Value,
    ) -> Self {
        Self {
            transaction_id,
            stage,
            timestamp: Utc::now(),
            action: action.into(),
            outcome,
            details,
        }
    }
}
