//! PaySentry Provenance - Append-only lifecycle log
//!
//! Every consequential step a transaction takes produces a provenance
//! record. Chains are append-only: records are never removed or reordered,
//! and detail maps are stored verbatim.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use paysentry_types::{ProvenanceOutcome, ProvenanceRecord, ProvenanceStage, TransactionId};

/// The PaySentry provenance log
///
/// Appends for one transaction are serialized by the interior lock;
/// cross-transaction appends contend only briefly on the same map.
#[derive(Default)]
pub struct ProvenanceLog {
    chains: RwLock<HashMap<TransactionId, Vec<ProvenanceRecord>>>,
}

impl ProvenanceLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn append(
        &self,
        transaction_id: &TransactionId,
        stage: ProvenanceStage,
        action: &str,
        outcome: ProvenanceOutcome,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        let record =
            ProvenanceRecord::new(transaction_id.clone(), stage, action, outcome, details);
        debug!(transaction_id = %transaction_id, stage = %stage, "provenance append");
        self.chains
            .write()
            .entry(transaction_id.clone())
            .or_default()
            .push(record.clone());
        record
    }

    /// Record that an agent declared intent to pay
    pub fn record_intent(
        &self,
        transaction_id: &TransactionId,
        action: &str,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::Intent,
            action,
            ProvenanceOutcome::Pending,
            details,
        )
    }

    /// Record a policy evaluation and its outcome
    pub fn record_policy_check(
        &self,
        transaction_id: &TransactionId,
        outcome: ProvenanceOutcome,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::PolicyCheck,
            "policy evaluation",
            outcome,
            details,
        )
    }

    /// Record an external approval decision
    pub fn record_approval(
        &self,
        transaction_id: &TransactionId,
        outcome: ProvenanceOutcome,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::Approval,
            "approval decision",
            outcome,
            details,
        )
    }

    /// Record hand-off to a payment backend
    pub fn record_execution(
        &self,
        transaction_id: &TransactionId,
        action: &str,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::Execution,
            action,
            ProvenanceOutcome::Pending,
            details,
        )
    }

    /// Record the backend's settlement result
    pub fn record_settlement(
        &self,
        transaction_id: &TransactionId,
        outcome: ProvenanceOutcome,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::Settlement,
            "settlement",
            outcome,
            details,
        )
    }

    /// Record that a dispute was filed against the transaction
    pub fn record_dispute(
        &self,
        transaction_id: &TransactionId,
        action: &str,
        details: serde_json::Value,
    ) -> ProvenanceRecord {
        self.append(
            transaction_id,
            ProvenanceStage::Dispute,
            action,
            ProvenanceOutcome::Pending,
            details,
        )
    }

    /// The chain for a transaction, in append order
    pub fn get_chain(&self, transaction_id: &TransactionId) -> Vec<ProvenanceRecord> {
        self.chains
            .read()
            .get(transaction_id)
            .cloned()
            .unwrap_or_default()
    }

    /// A chain is complete once it holds an intent and a final stage
    /// (settlement or dispute)
    pub fn is_complete(&self, transaction_id: &TransactionId) -> bool {
        let chains = self.chains.read();
        let Some(chain) = chains.get(transaction_id) else {
            return false;
        };
        let has_intent = chain.iter().any(|r| r.stage == ProvenanceStage::Intent);
        let has_final = chain.iter().any(|r| {
            r.stage == ProvenanceStage::Settlement || r.stage == ProvenanceStage::Dispute
        });
        has_intent && has_final
    }

    /// The most recently appended stage for a transaction
    pub fn get_last_stage(&self, transaction_id: &TransactionId) -> Option<ProvenanceStage> {
        self.chains
            .read()
            .get(transaction_id)
            .and_then(|chain| chain.last())
            .map(|r| r.stage)
    }

    /// All transaction ids with at least one record
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.chains.read().keys().cloned().collect()
    }

    /// Total records across all chains
    pub fn total_records(&self) -> usize {
        self.chains.read().values().map(Vec::len).sum()
    }
}
