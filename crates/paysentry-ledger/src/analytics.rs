//! Aggregated spend summaries over the ledger
//!
//! Analytics are read-only: they fold over ledger state and never mutate
//! it, so they can run concurrently with recording.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paysentry_types::TransactionStatus;

use crate::SpendLedger;

/// Workspace-wide spend summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpendSummary {
    /// Transactions recorded, any status
    pub total_transactions: usize,
    /// Transactions that settled successfully
    pub completed_transactions: usize,
    /// Settled spend per currency
    pub total_by_currency: HashMap<String, Decimal>,
    /// Settled spend per agent (all currencies folded per agent+currency key)
    pub spend_by_agent: HashMap<String, Decimal>,
    /// Settled spend per service tag
    pub spend_by_service: HashMap<String, Decimal>,
    /// Transaction counts per status
    pub count_by_status: HashMap<String, usize>,
    /// Transaction counts per protocol
    pub count_by_protocol: HashMap<String, usize>,
}

/// Per-agent spend summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    /// The agent
    pub agent_id: String,
    /// Transactions recorded for the agent
    pub transaction_count: usize,
    /// Transactions that settled successfully
    pub completed_count: usize,
    /// Settled spend per currency
    pub total_by_currency: HashMap<String, Decimal>,
    /// Distinct recipients paid
    pub recipients: Vec<String>,
    /// Mean settled amount across currencies, if anything settled
    pub average_amount: Option<Decimal>,
}

/// Read-only aggregation over a [`SpendLedger`]
pub struct SpendAnalytics {
    ledger: Arc<SpendLedger>,
}

impl SpendAnalytics {
    /// Create analytics over a ledger
    pub fn new(ledger: Arc<SpendLedger>) -> Self {
        Self { ledger }
    }

    /// Summarize the whole ledger
    pub fn summary(&self) -> SpendSummary {
        let mut summary = SpendSummary::default();

        for tx in self.ledger.all() {
            summary.total_transactions += 1;
            *summary.count_by_status.entry(tx.status.to_string()).or_default() += 1;
            *summary
                .count_by_protocol
                .entry(tx.protocol.to_string())
                .or_default() += 1;

            if tx.status == TransactionStatus::Completed {
                summary.completed_transactions += 1;
                *summary
                    .total_by_currency
                    .entry(tx.currency.clone())
                    .or_default() += tx.amount;
                *summary.spend_by_agent.entry(tx.agent_id.clone()).or_default() += tx.amount;
                if let Some(service) = &tx.service_id {
                    *summary.spend_by_service.entry(service.clone()).or_default() += tx.amount;
                }
            }
        }

        summary
    }

    /// Summarize one agent's activity
    pub fn agent_summary(&self, agent_id: &str) -> AgentSummary {
        let transactions = self.ledger.get_by_agent(agent_id);
        let mut total_by_currency: HashMap<String, Decimal> = HashMap::new();
        let mut recipients: Vec<String> = Vec::new();
        let mut completed_count = 0usize;
        let mut completed_total = Decimal::ZERO;

        for tx in &transactions {
            if !recipients.contains(&tx.recipient) {
                recipients.push(tx.recipient.clone());
            }
            if tx.status == TransactionStatus::Completed {
                completed_count += 1;
                completed_total += tx.amount;
                *total_by_currency.entry(tx.currency.clone()).or_default() += tx.amount;
            }
        }

        let average_amount = if completed_count > 0 {
            Some(completed_total / Decimal::from(completed_count as u64))
        } else {
            None
        };

        AgentSummary {
            agent_id: agent_id.to_string(),
            transaction_count: transactions.len(),
            completed_count,
            total_by_currency,
            recipients,
            average_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysentry_types::{PaymentProtocol, Transaction};
    use rust_decimal_macros::dec;

    fn completed(agent: &str, recipient: &str, amount: Decimal) -> Transaction {
        let mut t = Transaction::new(
            agent,
            recipient,
            amount,
            "USDC",
            "test",
            PaymentProtocol::X402,
        );
        t.mark(TransactionStatus::Approved);
        t.mark(TransactionStatus::Executing);
        t.mark(TransactionStatus::Completed);
        t
    }

    #[test]
    fn test_summary_counts_settled_funds_only() {
        let ledger = Arc::new(SpendLedger::new());
        ledger.record(completed("agent-1", "merchant-a", dec!(10)));
        ledger.record(completed("agent-1", "merchant-b", dec!(20)));
        ledger.record(Transaction::new(
            "agent-1",
            "merchant-c",
            dec!(99),
            "USDC",
            "pending one",
            PaymentProtocol::X402,
        ));

        let analytics = SpendAnalytics::new(ledger);
        let summary = analytics.summary();

        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.completed_transactions, 2);
        assert_eq!(summary.total_by_currency["USDC"], dec!(30));
        assert_eq!(summary.spend_by_agent["agent-1"], dec!(30));
        assert_eq!(summary.count_by_status["pending"], 1);
        assert_eq!(summary.count_by_protocol["x402"], 3);
    }

    #[test]
    fn test_agent_summary() {
        let ledger = Arc::new(SpendLedger::new());
        ledger.record(completed("agent-1", "merchant-a", dec!(10)));
        ledger.record(completed("agent-1", "merchant-a", dec!(30)));
        ledger.record(completed("agent-2", "merchant-b", dec!(5)));

        let analytics = SpendAnalytics::new(ledger);
        let summary = analytics.agent_summary("agent-1");

        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.recipients, vec!["merchant-a"]);
        assert_eq!(summary.average_amount, Some(dec!(20)));
        assert_eq!(summary.total_by_currency["USDC"], dec!(40));
    }

    #[test]
    fn test_unknown_agent_summary_is_empty() {
        let ledger = Arc::new(SpendLedger::new());
        let analytics = SpendAnalytics::new(ledger);
        let summary = analytics.agent_summary("nobody");
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.average_amount, None);
    }
}
