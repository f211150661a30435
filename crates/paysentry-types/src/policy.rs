//! Spend policy types for PaySentry
//!
//! Policies are declarative: an ordered rule list plus budget limits and an
//! optional per-agent cooldown. The JSON wire format is camelCase so policy
//! files can be shared with non-Rust tooling unchanged.

use crate::{glob_match, PaymentProtocol, Transaction};
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Action a policy rule takes when its condition matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Let the payment proceed
    Allow,
    /// Let it proceed but mark it for review
    Flag,
    /// Hold for an external approval decision
    RequireApproval,
    /// Block the payment
    Deny,
}

impl RuleAction {
    /// Restrictiveness rank: lower is more restrictive.
    ///
    /// `deny(0) < require_approval(1) < flag(2) < allow(3)`. Combining
    /// decisions across policies picks the lowest rank.
    pub fn severity_rank(&self) -> u8 {
        match self {
            Self::Deny => 0,
            Self::RequireApproval => 1,
            Self::Flag => 2,
            Self::Allow => 3,
        }
    }

    /// Whether this action lets the payment proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow | Self::Flag)
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allow => "allow",
            Self::Flag => "flag",
            Self::RequireApproval => "require_approval",
            Self::Deny => "deny",
        };
        write!(f, "{}", s)
    }
}

/// Condition of a policy rule: the AND of every present field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditions {
    /// Glob patterns matched against the agent id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<String>>,
    /// Glob patterns matched against the recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
    /// Exact service tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    /// Exact protocols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<PaymentProtocol>>,
    /// Inclusive lower amount bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    /// Inclusive upper amount bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    /// Exact currency codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currencies: Option<Vec<String>>,
    /// Metadata pairs that must all exist verbatim on the transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl RuleConditions {
    /// Check whether a transaction satisfies every present field.
    ///
    /// An empty condition set matches everything.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(agents) = &self.agents {
            if !agents.iter().any(|p| glob_match(&tx.agent_id, p)) {
                return false;
            }
        }
        if let Some(recipients) = &self.recipients {
            if !recipients.iter().any(|p| glob_match(&tx.recipient, p)) {
                return false;
            }
        }
        if let Some(services) = &self.services {
            match &tx.service_id {
                Some(service) if services.contains(service) => {}
                _ => return false,
            }
        }
        if let Some(protocols) = &self.protocols {
            if !protocols.contains(&tx.protocol) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if tx.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if tx.amount > max {
                return false;
            }
        }
        if let Some(currencies) = &self.currencies {
            if !currencies.contains(&tx.currency) {
                return false;
            }
        }
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                if tx.metadata_value(key) != Some(value.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

/// A single policy rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Rule ID
    pub id: String,
    /// Rule name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Rule description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether enabled
    pub enabled: bool,
    /// Priority (lower evaluates earlier; ties keep load order)
    pub priority: i64,
    /// Match condition
    #[serde(default)]
    pub conditions: RuleConditions,
    /// Action taken when the condition matches
    pub action: RuleAction,
}

/// Budget accumulation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetWindow {
    /// Each evaluation is its own window
    PerTransaction,
    /// Calendar hour, UTC
    Hourly,
    /// Calendar day, UTC
    Daily,
    /// ISO week starting Monday, UTC
    Weekly,
    /// Calendar month, UTC
    Monthly,
}

impl BudgetWindow {
    /// Deterministic key identifying the window instance containing `at`.
    ///
    /// Per-transaction windows have no instance and key to the empty string.
    pub fn window_key(&self, at: DateTime<Utc>) -> String {
        match self {
            Self::PerTransaction => String::new(),
            Self::Hourly => at.format("%Y-%m-%dT%H").to_string(),
            Self::Daily => at.format("%Y-%m-%d").to_string(),
            Self::Weekly => {
                let monday =
                    at.date_naive() - Duration::days(at.weekday().num_days_from_monday() as i64);
                monday.format("%Y-%m-%d").to_string()
            }
            Self::Monthly => at.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for BudgetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PerTransaction => "per_transaction",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        write!(f, "{}", s)
    }
}

/// A budget limit attached to a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLimit {
    /// Accumulation window
    pub window: BudgetWindow,
    /// Ceiling for the window
    pub max_amount: Decimal,
    /// Only count transactions in this currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Only count these agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ids: Option<Vec<String>>,
    /// Only count these service tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ids: Option<Vec<String>>,
}

impl BudgetLimit {
    /// Check whether a transaction falls under this budget's filters
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(currency) = &self.currency {
            if currency != &tx.currency {
                return false;
            }
        }
        if let Some(agents) = &self.agent_ids {
            if !agents.contains(&tx.agent_id) {
                return false;
            }
        }
        if let Some(services) = &self.service_ids {
            match &tx.service_id {
                Some(service) if services.contains(service) => {}
                _ => return false,
            }
        }
        true
    }

    /// Deterministic serialization of the budget's scope filters.
    ///
    /// An unscoped budget keys to `global`; scoped budgets sort their id
    /// lists so the key is stable across load order.
    pub fn scope_key(&self) -> String {
        if self.currency.is_none() && self.agent_ids.is_none() && self.service_ids.is_none() {
            return "global".to_string();
        }
        let mut parts = Vec::new();
        if let Some(agents) = &self.agent_ids {
            let mut sorted = agents.clone();
            sorted.sort();
            parts.push(format!("agents={}", sorted.join(",")));
        }
        if let Some(services) = &self.service_ids {
            let mut sorted = services.clone();
            sorted.sort();
            parts.push(format!("services={}", sorted.join(",")));
        }
        if let Some(currency) = &self.currency {
            parts.push(format!("currency={}", currency));
        }
        parts.join("|")
    }
}

/// A declarative spend policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPolicy {
    /// Policy ID
    pub id: String,
    /// Policy name
    pub name: String,
    /// Whether enabled
    pub enabled: bool,
    /// Ordered rule list
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Budget limits
    #[serde(default)]
    pub budgets: Vec<BudgetLimit>,
    /// Per-agent cooldown between payments, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
}

impl SpendPolicy {
    /// Parse a policy from its JSON file format
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize back to the JSON file format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Outcome of evaluating a transaction against the loaded policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    /// Whether the payment may proceed
    pub allowed: bool,
    /// The action that produced this decision
    pub action: RuleAction,
    /// Human-readable reason
    pub reason: String,
    /// Policy that produced the decision, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Rule that fired, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Decision-specific detail (violated budget, cooldown remaining, ...)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl PolicyDecision {
    /// Build a decision from an action
    pub fn from_action(action: RuleAction, reason: impl Into<String>) -> Self {
        Self {
            allowed: action.is_allowed(),
            action,
            reason: reason.into(),
            policy_id: None,
            rule_id: None,
            details: serde_json::Value::Null,
        }
    }

    /// An allow decision
    pub fn allow(reason: impl Into<String>) -> Self {
        Self::from_action(RuleAction::Allow, reason)
    }

    /// A deny decision
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::from_action(RuleAction::Deny, reason)
    }

    /// Attach the originating policy
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// Attach the firing rule
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Attach decision-specific detail
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Current consumption of one budget bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentSpend {
    /// Settled amount recorded in the window
    pub amount: Decimal,
    /// Number of recorded transactions
    pub count: u64,
}
