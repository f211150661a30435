//! PaySentry Alerts - Spend monitoring rules and alert dispatch
//!
//! The alert evaluator watches the transaction stream for conditions worth
//! telling a human about: budget thresholds approached, unusually large
//! payments, rate spikes, first-time recipients and statistically anomalous
//! amounts.
//!
//! # Rule Types
//!
//! - **Budget threshold**: sliding-window spend approaching a ceiling
//! - **Large transaction**: a single payment at or above a threshold
//! - **Rate spike**: too many payments per window for one agent
//! - **New recipient**: first payment to a recipient not seen before
//! - **Anomaly**: amount more than N standard deviations above the mean
//!
//! Evaluation never raises on domain input; it returns the (possibly empty)
//! list of fired alerts. Handler errors are caught and logged; they never
//! block other handlers or other alerts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use paysentry_ledger::SpendLedger;
use paysentry_types::{
    Alert, AlertSeverity, AlertType, Result, Transaction, TransactionFilter, TransactionStatus,
};

/// Condition checked by an alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AlertRuleKind {
    /// Sliding-window spend approaching a budget ceiling
    BudgetThreshold {
        /// Only watch this agent (all agents when absent)
        agent_id: Option<String>,
        /// Currency the threshold is denominated in
        currency: String,
        /// Sliding window size in milliseconds
        window_ms: u64,
        /// Budget ceiling
        threshold: Decimal,
        /// Fire when projected spend reaches this fraction of the ceiling
        alert_at_percent: Decimal,
    },
    /// A single payment at or above a threshold
    LargeTransaction { currency: String, threshold: Decimal },
    /// Too many payments per window for one agent
    RateSpike {
        agent_id: Option<String>,
        max_transactions: usize,
        window_ms: u64,
    },
    /// First payment to a recipient not seen before
    NewRecipient { agent_id: Option<String> },
    /// Amount more than N standard deviations above the agent's mean
    Anomaly {
        agent_id: Option<String>,
        std_dev_threshold: f64,
        min_sample_size: usize,
    },
}

impl AlertRuleKind {
    fn alert_type(&self) -> AlertType {
        match self {
            Self::BudgetThreshold { .. } => AlertType::BudgetThreshold,
            Self::LargeTransaction { .. } => AlertType::LargeTransaction,
            Self::RateSpike { .. } => AlertType::RateSpike,
            Self::NewRecipient { .. } => AlertType::NewRecipient,
            Self::Anomaly { .. } => AlertType::Anomaly,
        }
    }
}

/// A configured alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule ID
    pub id: String,
    /// Rule name
    pub name: String,
    /// Severity inherited by fired alerts
    pub severity: AlertSeverity,
    /// Whether enabled
    pub enabled: bool,
    /// Condition
    pub kind: AlertRuleKind,
}

impl AlertRule {
    /// Create an enabled rule
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: AlertSeverity,
        kind: AlertRuleKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            enabled: true,
            kind,
        }
    }
}

/// Receiver for fired alerts
///
/// Implementations may yield; errors are caught by the evaluator.
#[async_trait]
pub trait AlertHandler: Send + Sync {
    /// Deliver one alert
    async fn handle(&self, alert: &Alert) -> Result<()>;

    /// Handler name, used in error logs
    fn name(&self) -> &str;
}

/// In-memory alert handler for testing
pub struct InMemoryHandler {
    name: String,
    received: RwLock<Vec<Alert>>,
}

impl InMemoryHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: RwLock::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<Alert> {
        self.received.read().clone()
    }
}

#[async_trait]
impl AlertHandler for InMemoryHandler {
    async fn handle(&self, alert: &Alert) -> Result<()> {
        self.received.write().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The PaySentry alert evaluator
pub struct AlertEvaluator {
    ledger: Arc<SpendLedger>,
    rules: RwLock<Vec<AlertRule>>,
    /// Seen recipients per scope key (agent id or `*`), seeded lazily
    seen_recipients: RwLock<HashMap<String, HashSet<String>>>,
    handlers: RwLock<Vec<Arc<dyn AlertHandler>>>,
}

impl AlertEvaluator {
    /// Create an evaluator over a ledger
    pub fn new(ledger: Arc<SpendLedger>) -> Self {
        Self {
            ledger,
            rules: RwLock::new(Vec::new()),
            seen_recipients: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Add a rule
    pub fn add_rule(&self, rule: AlertRule) {
        self.rules.write().push(rule);
    }

    /// Remove a rule by id
    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        rules.len() != before
    }

    /// Snapshot of configured rules
    pub fn get_rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    /// Register a handler for fired alerts
    pub fn on_alert(&self, handler: Arc<dyn AlertHandler>) {
        self.handlers.write().push(handler);
    }

    /// Evaluate a transaction against every enabled rule, then deliver the
    /// fired alerts to every registered handler.
    ///
    /// Handler errors are logged and swallowed; delivery continues.
    pub async fn evaluate(&self, tx: &Transaction) -> Vec<Alert> {
        let alerts = self.check_rules(tx);

        let handlers: Vec<Arc<dyn AlertHandler>> = self.handlers.read().clone();
        for alert in &alerts {
            for handler in &handlers {
                if let Err(e) = handler.handle(alert).await {
                    warn!(
                        handler = handler.name(),
                        alert_type = %alert.alert_type,
                        error = %e,
                        "alert handler failed"
                    );
                }
            }
        }

        alerts
    }

    fn check_rules(&self, tx: &Transaction) -> Vec<Alert> {
        let rules: Vec<AlertRule> = self.rules.read().clone();
        let mut alerts = Vec::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            if let Some(alert) = self.check_rule(rule, tx) {
                alerts.push(
                    alert.with_agent(tx.agent_id.clone()).with_transaction(tx.id.clone()),
                );
            }
        }

        alerts
    }

    fn check_rule(&self, rule: &AlertRule, tx: &Transaction) -> Option<Alert> {
        match &rule.kind {
            AlertRuleKind::BudgetThreshold {
                agent_id,
                currency,
                window_ms,
                threshold,
                alert_at_percent,
            } => self.check_budget_threshold(
                rule,
                tx,
                agent_id.as_deref(),
                currency,
                *window_ms,
                *threshold,
                *alert_at_percent,
            ),
            AlertRuleKind::LargeTransaction { currency, threshold } => {
                if &tx.currency == currency && tx.amount >= *threshold {
                    Some(
                        Alert::new(
                            AlertType::LargeTransaction,
                            rule.severity,
                            format!(
                                "Large transaction: {} {} from {}",
                                tx.amount, tx.currency, tx.agent_id
                            ),
                        )
                        .with_data(json!({
                            "ruleId": rule.id,
                            "ruleName": rule.name,
                            "amount": tx.amount,
                            "threshold": threshold,
                        })),
                    )
                } else {
                    None
                }
            }
            AlertRuleKind::RateSpike {
                agent_id,
                max_transactions,
                window_ms,
            } => self.check_rate_spike(rule, tx, agent_id.as_deref(), *max_transactions, *window_ms),
            AlertRuleKind::NewRecipient { agent_id } => {
                self.check_new_recipient(rule, tx, agent_id.as_deref())
            }
            AlertRuleKind::Anomaly {
                agent_id,
                std_dev_threshold,
                min_sample_size,
            } => self.check_anomaly(rule, tx, agent_id.as_deref(), *std_dev_threshold, *min_sample_size),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_budget_threshold(
        &self,
        rule: &AlertRule,
        tx: &Transaction,
        agent_filter: Option<&str>,
        currency: &str,
        window_ms: u64,
        threshold: Decimal,
        alert_at_percent: Decimal,
    ) -> Option<Alert> {
        if tx.currency != currency {
            return None;
        }
        if let Some(agent) = agent_filter {
            if tx.agent_id != agent {
                return None;
            }
        }

        let after = Utc::now() - Duration::milliseconds(window_ms as i64);
        let window_spend: Decimal = self
            .ledger
            .query(&TransactionFilter {
                agent_id: agent_filter.map(str::to_string),
                currency: Some(currency.to_string()),
                status: Some(TransactionStatus::Completed),
                after: Some(after),
                ..Default::default()
            })
            .iter()
            .map(|t| t.amount)
            .sum();

        let projected = window_spend + tx.amount;
        if projected >= threshold * alert_at_percent {
            let percent_used = if threshold.is_zero() {
                Decimal::ZERO
            } else {
                projected / threshold * Decimal::from(100)
            };
            Some(
                Alert::new(
                    AlertType::BudgetThreshold,
                    rule.severity,
                    format!(
                        "Budget threshold approached: {:.1}% of {} {} used",
                        percent_used, threshold, currency
                    ),
                )
                .with_data(json!({
                    "ruleId": rule.id,
                    "ruleName": rule.name,
                    "windowSpend": window_spend,
                    "projectedAmount": projected,
                    "threshold": threshold,
                    "percentUsed": percent_used,
                })),
            )
        } else {
            None
        }
    }

    fn check_rate_spike(
        &self,
        rule: &AlertRule,
        tx: &Transaction,
        agent_filter: Option<&str>,
        max_transactions: usize,
        window_ms: u64,
    ) -> Option<Alert> {
        if let Some(agent) = agent_filter {
            if tx.agent_id != agent {
                return None;
            }
        }

        let after = Utc::now() - Duration::milliseconds(window_ms as i64);
        let recent = self
            .ledger
            .query(&TransactionFilter {
                agent_id: Some(tx.agent_id.clone()),
                after: Some(after),
                ..Default::default()
            })
            .len();

        // The transaction under evaluation counts too.
        let count = recent + 1;
        if count > max_transactions {
            Some(
                Alert::new(
                    AlertType::RateSpike,
                    rule.severity,
                    format!(
                        "Rate spike: {} transactions in {}ms for {}",
                        count, window_ms, tx.agent_id
                    ),
                )
                .with_data(json!({
                    "ruleId": rule.id,
                    "ruleName": rule.name,
                    "count": count,
                    "maxTransactions": max_transactions,
                    "windowMs": window_ms,
                })),
            )
        } else {
            None
        }
    }

    fn check_new_recipient(
        &self,
        rule: &AlertRule,
        tx: &Transaction,
        agent_filter: Option<&str>,
    ) -> Option<Alert> {
        if let Some(agent) = agent_filter {
            if tx.agent_id != agent {
                return None;
            }
        }

        let scope = agent_filter.unwrap_or("*").to_string();
        let mut seen = self.seen_recipients.write();
        let known = seen.entry(scope.clone()).or_insert_with(|| {
            // First evaluation for this scope: seed from the ledger.
            match agent_filter {
                Some(agent) => self
                    .ledger
                    .get_by_agent(agent)
                    .into_iter()
                    .map(|t| t.recipient)
                    .collect(),
                None => self.ledger.recipients().into_iter().collect(),
            }
        });

        if known.contains(&tx.recipient) {
            return None;
        }
        known.insert(tx.recipient.clone());

        Some(
            Alert::new(
                AlertType::NewRecipient,
                rule.severity,
                format!("First payment to {} by {}", tx.recipient, tx.agent_id),
            )
            .with_data(json!({
                "ruleId": rule.id,
                "ruleName": rule.name,
                "recipient": tx.recipient,
                "scope": scope,
            })),
        )
    }

    fn check_anomaly(
        &self,
        rule: &AlertRule,
        tx: &Transaction,
        agent_filter: Option<&str>,
        std_dev_threshold: f64,
        min_sample_size: usize,
    ) -> Option<Alert> {
        if let Some(agent) = agent_filter {
            if tx.agent_id != agent {
                return None;
            }
        }

        let sample: Vec<f64> = self
            .ledger
            .query(&TransactionFilter {
                agent_id: Some(tx.agent_id.clone()),
                currency: Some(tx.currency.clone()),
                status: Some(TransactionStatus::Completed),
                ..Default::default()
            })
            .iter()
            .filter_map(|t| t.amount.to_f64())
            .collect();

        if sample.len() < min_sample_size {
            return None;
        }

        let n = sample.len() as f64;
        let mean = sample.iter().sum::<f64>() / n;
        // Population standard deviation: divide by N, not N-1.
        let variance = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev <= 0.0 {
            return None;
        }

        let amount = tx.amount.to_f64()?;
        let z = (amount - mean) / std_dev;
        if z > std_dev_threshold {
            Some(
                Alert::new(
                    AlertType::Anomaly,
                    rule.severity,
                    format!(
                        "Anomalous amount: {} {} is {:.1} standard deviations above the mean",
                        tx.amount, tx.currency, z
                    ),
                )
                .with_data(json!({
                    "ruleId": rule.id,
                    "ruleName": rule.name,
                    "zScore": z,
                    "mean": mean,
                    "stdDev": std_dev,
                    "sampleSize": sample.len(),
                })),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysentry_types::{PaySentryError, PaymentProtocol};
    use rust_decimal_macros::dec;

    fn completed(agent: &str, recipient: &str, amount: Decimal) -> Transaction {
        let mut t = Transaction::new(agent, recipient, amount, "USDC", "test", PaymentProtocol::X402);
        t.mark(TransactionStatus::Approved);
        t.mark(TransactionStatus::Executing);
        t.mark(TransactionStatus::Completed);
        t
    }

    fn evaluator_with(ledger: Arc<SpendLedger>, rule: AlertRule) -> AlertEvaluator {
        let evaluator = AlertEvaluator::new(ledger);
        evaluator.add_rule(rule);
        evaluator
    }

    #[tokio::test]
    async fn test_large_transaction_threshold_is_inclusive() {
        let ledger = Arc::new(SpendLedger::new());
        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "large",
                "Large tx",
                AlertSeverity::Warning,
                AlertRuleKind::LargeTransaction {
                    currency: "USDC".to_string(),
                    threshold: dec!(100),
                },
            ),
        );

        let below = completed("agent-1", "merchant-a", dec!(99));
        assert!(evaluator.evaluate(&below).await.is_empty());

        let at = completed("agent-1", "merchant-a", dec!(100));
        let alerts = evaluator.evaluate(&at).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::LargeTransaction);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].data["ruleId"], "large");
        assert_eq!(alerts[0].agent_id.as_deref(), Some("agent-1"));
    }

    #[tokio::test]
    async fn test_budget_threshold_projection() {
        let ledger = Arc::new(SpendLedger::new());
        ledger.record(completed("agent-1", "merchant-a", dec!(70)));

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "budget",
                "Budget 80%",
                AlertSeverity::Warning,
                AlertRuleKind::BudgetThreshold {
                    agent_id: Some("agent-1".to_string()),
                    currency: "USDC".to_string(),
                    window_ms: 3_600_000,
                    threshold: dec!(100),
                    alert_at_percent: dec!(0.8),
                },
            ),
        );

        // 70 + 5 = 75 < 80: quiet
        let small = completed("agent-1", "merchant-a", dec!(5));
        assert!(evaluator.evaluate(&small).await.is_empty());

        // 70 + 15 = 85 >= 80: fires with projected utilization
        let tipping = completed("agent-1", "merchant-a", dec!(15));
        let alerts = evaluator.evaluate(&tipping).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].data["projectedAmount"], serde_json::json!(dec!(85)));
    }

    #[tokio::test]
    async fn test_budget_threshold_ignores_other_currencies_and_pending() {
        let ledger = Arc::new(SpendLedger::new());
        let mut eth = completed("agent-1", "merchant-a", dec!(1000));
        eth.currency = "ETH".to_string();
        ledger.record(eth);
        ledger.record(Transaction::new(
            "agent-1",
            "merchant-a",
            dec!(1000),
            "USDC",
            "still pending",
            PaymentProtocol::X402,
        ));

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "budget",
                "Budget",
                AlertSeverity::Warning,
                AlertRuleKind::BudgetThreshold {
                    agent_id: None,
                    currency: "USDC".to_string(),
                    window_ms: 3_600_000,
                    threshold: dec!(100),
                    alert_at_percent: dec!(0.8),
                },
            ),
        );

        // Neither the ETH spend nor the pending USDC spend counts.
        let tx = completed("agent-1", "merchant-a", dec!(10));
        assert!(evaluator.evaluate(&tx).await.is_empty());
    }

    #[tokio::test]
    async fn test_rate_spike() {
        let ledger = Arc::new(SpendLedger::new());
        for _ in 0..3 {
            ledger.record(completed("agent-1", "merchant-a", dec!(1)));
        }

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "rate",
                "Rate spike",
                AlertSeverity::Critical,
                AlertRuleKind::RateSpike {
                    agent_id: None,
                    max_transactions: 3,
                    window_ms: 60_000,
                },
            ),
        );

        // 3 recorded + current = 4 > 3
        let tx = completed("agent-1", "merchant-a", dec!(1));
        let alerts = evaluator.evaluate(&tx).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].data["count"], 4);
    }

    #[tokio::test]
    async fn test_rate_spike_counts_per_agent() {
        let ledger = Arc::new(SpendLedger::new());
        for _ in 0..5 {
            ledger.record(completed("agent-other", "merchant-a", dec!(1)));
        }

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "rate",
                "Rate spike",
                AlertSeverity::Critical,
                AlertRuleKind::RateSpike {
                    agent_id: None,
                    max_transactions: 3,
                    window_ms: 60_000,
                },
            ),
        );

        // agent-1 has no history; the other agent's burst is irrelevant.
        let tx = completed("agent-1", "merchant-a", dec!(1));
        assert!(evaluator.evaluate(&tx).await.is_empty());
    }

    #[tokio::test]
    async fn test_new_recipient_seeds_from_ledger() {
        let ledger = Arc::new(SpendLedger::new());
        ledger.record(completed("agent-1", "merchant-known", dec!(5)));

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "recipient",
                "New recipient",
                AlertSeverity::Info,
                AlertRuleKind::NewRecipient { agent_id: None },
            ),
        );

        // Known from the seed: quiet.
        let known = completed("agent-1", "merchant-known", dec!(5));
        assert!(evaluator.evaluate(&known).await.is_empty());

        // Fresh recipient fires once, then is known.
        let fresh = completed("agent-1", "merchant-new", dec!(5));
        assert_eq!(evaluator.evaluate(&fresh).await.len(), 1);
        let again = completed("agent-1", "merchant-new", dec!(5));
        assert!(evaluator.evaluate(&again).await.is_empty());
    }

    #[tokio::test]
    async fn test_anomaly_fires_above_z_threshold() {
        let ledger = Arc::new(SpendLedger::new());
        // Sample: mean 10, some spread
        for amount in [dec!(9), dec!(10), dec!(11), dec!(10), dec!(10)] {
            ledger.record(completed("agent-1", "merchant-a", amount));
        }

        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "anomaly",
                "Anomaly",
                AlertSeverity::Critical,
                AlertRuleKind::Anomaly {
                    agent_id: None,
                    std_dev_threshold: 3.0,
                    min_sample_size: 5,
                },
            ),
        );

        let normal = completed("agent-1", "merchant-a", dec!(11));
        assert!(evaluator.evaluate(&normal).await.is_empty());

        let weird = completed("agent-1", "merchant-a", dec!(500));
        let alerts = evaluator.evaluate(&weird).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Anomaly);
    }

    #[tokio::test]
    async fn test_anomaly_never_fires_without_spread_or_samples() {
        let ledger = Arc::new(SpendLedger::new());
        // Identical amounts: zero standard deviation.
        for _ in 0..10 {
            ledger.record(completed("agent-1", "merchant-a", dec!(10)));
        }

        let evaluator = evaluator_with(
            ledger.clone(),
            AlertRule::new(
                "anomaly",
                "Anomaly",
                AlertSeverity::Critical,
                AlertRuleKind::Anomaly {
                    agent_id: None,
                    std_dev_threshold: 2.0,
                    min_sample_size: 5,
                },
            ),
        );

        let tx = completed("agent-1", "merchant-a", dec!(1000));
        assert!(evaluator.evaluate(&tx).await.is_empty());

        // Under the minimum sample size: quiet regardless of spread.
        let sparse = AlertEvaluator::new(Arc::new(SpendLedger::new()));
        sparse.add_rule(AlertRule::new(
            "anomaly",
            "Anomaly",
            AlertSeverity::Critical,
            AlertRuleKind::Anomaly {
                agent_id: None,
                std_dev_threshold: 2.0,
                min_sample_size: 5,
            },
        ));
        assert!(sparse.evaluate(&tx).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_rules_are_skipped() {
        let ledger = Arc::new(SpendLedger::new());
        let mut rule = AlertRule::new(
            "large",
            "Large tx",
            AlertSeverity::Warning,
            AlertRuleKind::LargeTransaction {
                currency: "USDC".to_string(),
                threshold: dec!(1),
            },
        );
        rule.enabled = false;
        let evaluator = evaluator_with(ledger, rule);

        let tx = completed("agent-1", "merchant-a", dec!(1000));
        assert!(evaluator.evaluate(&tx).await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_errors_do_not_block_delivery() {
        struct FailingHandler;

        #[async_trait]
        impl AlertHandler for FailingHandler {
            async fn handle(&self, _alert: &Alert) -> Result<()> {
                Err(PaySentryError::invalid_input("handler", "always fails"))
            }

            fn name(&self) -> &str {
                "failing"
            }
        }

        let ledger = Arc::new(SpendLedger::new());
        let evaluator = evaluator_with(
            ledger,
            AlertRule::new(
                "large",
                "Large tx",
                AlertSeverity::Warning,
                AlertRuleKind::LargeTransaction {
                    currency: "USDC".to_string(),
                    threshold: dec!(1),
                },
            ),
        );

        let healthy = Arc::new(InMemoryHandler::new("healthy"));
        evaluator.on_alert(Arc::new(FailingHandler));
        evaluator.on_alert(healthy.clone());

        let tx = completed("agent-1", "merchant-a", dec!(10));
        let alerts = evaluator.evaluate(&tx).await;
        assert_eq!(alerts.len(), 1);
        // The failing handler did not stop delivery to the healthy one.
        assert_eq!(healthy.received().len(), 1);
    }

    #[test]
    fn test_add_remove_rules() {
        let evaluator = AlertEvaluator::new(Arc::new(SpendLedger::new()));
        evaluator.add_rule(AlertRule::new(
            "r1",
            "Rule",
            AlertSeverity::Info,
            AlertRuleKind::NewRecipient { agent_id: None },
        ));
        assert_eq!(evaluator.get_rules().len(), 1);
        assert!(evaluator.remove_rule("r1"));
        assert!(!evaluator.remove_rule("r1"));
        assert!(evaluator.get_rules().is_empty());
    }
}
