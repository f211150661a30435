//! Alert types for PaySentry
//!
//! Alerts are fired by the alert evaluator when a transaction trips a
//! configured rule; delivery to notification channels is a collaborator
//! concern outside the core.

use crate::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Kind of alert, mirroring the rule taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Spend in a sliding window approached a budget threshold
    BudgetThreshold,
    /// A single transaction at or above a threshold
    LargeTransaction,
    /// Transaction rate exceeded a per-window maximum
    RateSpike,
    /// First payment to a recipient not seen before
    NewRecipient,
    /// Amount statistically anomalous for the agent
    Anomaly,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BudgetThreshold => "budget_threshold",
            Self::LargeTransaction => "large_transaction",
            Self::RateSpike => "rate_spike",
            Self::NewRecipient => "new_recipient",
            Self::Anomaly => "anomaly",
        };
        write!(f, "{}", s)
    }
}

/// A fired alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Kind of alert
    pub alert_type: AlertType,
    /// Severity inherited from the firing rule
    pub severity: AlertSeverity,
    /// Human-readable message
    pub message: String,
    /// When the alert fired
    pub timestamp: DateTime<Utc>,
    /// Agent involved, if any
    pub agent_id: Option<String>,
    /// Transaction that tripped the rule, if any
    pub transaction_id: Option<TransactionId>,
    /// Rule-specific data (includes `ruleId` and `ruleName`)
    pub data: serde_json::Value,
}

impl Alert {
    /// Create an alert stamped now
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            agent_id: None,
            transaction_id: None,
            data: serde_json::Value::Null,
        }
    }

    /// Attach the agent
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Attach the transaction
    pub fn with_transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Attach rule-specific data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}
