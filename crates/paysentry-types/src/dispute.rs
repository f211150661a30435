//! Dispute types for PaySentry
//!
//! A dispute contests a settled (or failed) transaction. Cases carry an
//! ordered evidence list and advance through a fixed status graph; closed
//! cases are immutable.

use crate::{DisputeId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Status of a dispute case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Filed, not yet looked at
    Open,
    /// Under investigation
    Investigating,
    /// Closed in the agent's favor, full refund
    ResolvedRefunded,
    /// Closed against the agent
    ResolvedDenied,
    /// Closed with a partial refund
    ResolvedPartial,
    /// Escalated to a human or external process
    Escalated,
}

impl DisputeStatus {
    /// Closed statuses forbid further evidence or status changes
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::ResolvedRefunded | Self::ResolvedDenied | Self::ResolvedPartial
        )
    }

    /// Whether this resolution entitles the agent to funds back
    pub fn is_refund(&self) -> bool {
        matches!(self, Self::ResolvedRefunded | Self::ResolvedPartial)
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::ResolvedRefunded => "resolved_refunded",
            Self::ResolvedDenied => "resolved_denied",
            Self::ResolvedPartial => "resolved_partial",
            Self::Escalated => "escalated",
        };
        write!(f, "{}", s)
    }
}

/// Party found liable for a disputed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityParty {
    Agent,
    ServiceProvider,
    Protocol,
    User,
    Undetermined,
}

/// One piece of dispute evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeEvidence {
    /// Evidence kind (`transaction_log`, `receipt`, `communication`, ...)
    pub kind: String,
    /// Human-readable description
    pub description: String,
    /// When the evidence was attached
    pub submitted_at: DateTime<Utc>,
    /// Evidence payload, stored verbatim
    pub data: serde_json::Value,
}

impl DisputeEvidence {
    /// Create evidence stamped now
    pub fn new(
        kind: impl Into<String>,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            submitted_at: Utc::now(),
            data,
        }
    }
}

/// A dispute case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeCase {
    /// Dispute ID
    pub id: DisputeId,
    /// Contested transaction
    pub transaction_id: TransactionId,
    /// Agent that filed
    pub agent_id: String,
    /// Why the transaction is contested
    pub reason: String,
    /// Current status
    pub status: DisputeStatus,
    /// Liability finding (undetermined until resolution)
    pub liability: LiabilityParty,
    /// Amount the agent asked back
    pub requested_amount: Decimal,
    /// Amount granted at resolution
    pub resolved_amount: Option<Decimal>,
    /// When the case was filed
    pub created_at: DateTime<Utc>,
    /// When the case last changed
    pub updated_at: DateTime<Utc>,
    /// When the case closed (set iff status is closed)
    pub resolved_at: Option<DateTime<Utc>>,
    /// Ordered evidence list
    pub evidence: Vec<DisputeEvidence>,
}

impl DisputeCase {
    /// Whether the case is closed
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }
}

/// Input to filing a dispute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDisputeInput {
    /// Contested transaction
    pub transaction_id: TransactionId,
    /// Agent filing the dispute
    pub agent_id: String,
    /// Why the transaction is contested
    pub reason: String,
    /// Amount asked back
    pub requested_amount: Decimal,
    /// Evidence supplied with the filing
    #[serde(default)]
    pub evidence: Vec<DisputeEvidence>,
}

/// Filter for querying disputes
#[derive(Debug, Clone, Default)]
pub struct DisputeFilter {
    pub status: Option<DisputeStatus>,
    pub agent_id: Option<String>,
    pub transaction_id: Option<TransactionId>,
    pub liability: Option<LiabilityParty>,
    pub limit: Option<usize>,
}

/// Aggregate dispute statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisputeStats {
    /// Total cases ever filed
    pub total: usize,
    /// Cases not yet closed
    pub open: usize,
    /// Cases by status name
    pub by_status: HashMap<String, usize>,
    /// Sum of requested amounts
    pub total_requested: Decimal,
    /// Sum of resolved amounts
    pub total_resolved: Decimal,
}
