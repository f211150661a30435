//! PaySentry Disputes - Contested transaction lifecycle
//!
//! A dispute contests a transaction the control plane already tracked.
//! Filing snapshots the transaction's provenance chain into the case as its
//! first piece of evidence, so the record the case is judged on is the
//! record that existed at filing time.
//!
//! # Invariants
//!
//! 1. At most one non-closed dispute per transaction
//! 2. Closed cases accept no further evidence or status changes
//! 3. `resolved_at` is set exactly when the case closes
//!
//! Listener exceptions are caught and logged; they never abort the
//! operation that triggered them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use paysentry_ledger::SpendLedger;
use paysentry_provenance::ProvenanceLog;
use paysentry_types::{
    DisputeCase, DisputeEvidence, DisputeFilter, DisputeId, DisputeStats, DisputeStatus,
    FileDisputeInput, LiabilityParty, PaySentryError, Result, TransactionId, TransactionStatus,
};

/// Resolution terms for closing a dispute
#[derive(Debug, Clone)]
pub struct DisputeResolution {
    /// Closing status (must be one of the resolved statuses)
    pub status: DisputeStatus,
    /// Liability finding
    pub liability: LiabilityParty,
    /// Amount granted, when different from the requested amount
    pub resolved_amount: Option<Decimal>,
}

/// Observer of dispute status changes
///
/// Implementations may yield; errors are caught by the manager.
#[async_trait]
pub trait DisputeListener: Send + Sync {
    /// Called after a status change, with the prior status
    async fn on_status_change(&self, dispute: &DisputeCase, previous: DisputeStatus)
        -> Result<()>;

    /// Listener name, used in error logs
    fn name(&self) -> &str;
}

#[derive(Default)]
struct DisputeStore {
    disputes: HashMap<DisputeId, DisputeCase>,
    order: Vec<DisputeId>,
}

/// The PaySentry dispute manager
pub struct DisputeManager {
    store: RwLock<DisputeStore>,
    listeners: parking_lot::RwLock<Vec<Arc<dyn DisputeListener>>>,
    provenance: Option<Arc<ProvenanceLog>>,
    ledger: Option<Arc<SpendLedger>>,
}

impl DisputeManager {
    /// Create a standalone manager
    pub fn new() -> Self {
        Self {
            store: RwLock::new(DisputeStore::default()),
            listeners: parking_lot::RwLock::new(Vec::new()),
            provenance: None,
            ledger: None,
        }
    }

    /// Attach a provenance log: filings snapshot the chain as evidence and
    /// append a dispute record
    pub fn with_provenance(mut self, provenance: Arc<ProvenanceLog>) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Attach a ledger: filings and resolutions drive the transaction's
    /// status
    pub fn with_ledger(mut self, ledger: Arc<SpendLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Register a status change listener
    pub fn on_status_change(&self, listener: Arc<dyn DisputeListener>) {
        self.listeners.write().push(listener);
    }

    /// File a new dispute.
    ///
    /// Fails if any non-closed dispute already covers the transaction.
    /// With a provenance log attached, the current chain is pulled into a
    /// `transaction_log` evidence record ahead of the caller's evidence,
    /// and a dispute provenance record is appended.
    pub async fn file(&self, input: FileDisputeInput) -> Result<DisputeCase> {
        let mut store = self.store.write().await;

        if let Some(active) = store
            .disputes
            .values()
            .find(|d| d.transaction_id == input.transaction_id && !d.is_closed())
        {
            return Err(PaySentryError::ActiveDisputeExists {
                transaction_id: input.transaction_id.to_string(),
                dispute_id: active.id.to_string(),
            });
        }

        let mut evidence = Vec::new();
        if let Some(provenance) = &self.provenance {
            let chain = provenance.get_chain(&input.transaction_id);
            evidence.push(DisputeEvidence::new(
                "transaction_log",
                "Provenance chain at filing time",
                json!(chain),
            ));
        }
        evidence.extend(input.evidence);

        let now = Utc::now();
        let dispute = DisputeCase {
            id: DisputeId::new(),
            transaction_id: input.transaction_id.clone(),
            agent_id: input.agent_id,
            reason: input.reason,
            status: DisputeStatus::Open,
            liability: LiabilityParty::Undetermined,
            requested_amount: input.requested_amount,
            resolved_amount: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            evidence,
        };

        store.order.push(dispute.id.clone());
        store.disputes.insert(dispute.id.clone(), dispute.clone());
        drop(store);

        if let Some(provenance) = &self.provenance {
            provenance.record_dispute(
                &input.transaction_id,
                "dispute filed",
                json!({
                    "disputeId": dispute.id,
                    "reason": dispute.reason,
                    "requestedAmount": dispute.requested_amount,
                }),
            );
        }

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.set_status(&input.transaction_id, TransactionStatus::Disputed) {
                warn!(
                    transaction_id = %input.transaction_id,
                    error = %e,
                    "could not mark transaction disputed"
                );
            }
        }

        info!(dispute_id = %dispute.id, transaction_id = %dispute.transaction_id, "dispute filed");
        Ok(dispute)
    }

    /// Attach evidence to an open dispute
    pub async fn add_evidence(
        &self,
        dispute_id: &DisputeId,
        evidence: DisputeEvidence,
    ) -> Result<DisputeCase> {
        let mut store = self.store.write().await;
        let dispute = store
            .disputes
            .get_mut(dispute_id)
            .ok_or_else(|| PaySentryError::DisputeNotFound {
                dispute_id: dispute_id.to_string(),
            })?;

        if dispute.is_closed() {
            return Err(PaySentryError::DisputeClosed {
                dispute_id: dispute_id.to_string(),
            });
        }

        dispute.evidence.push(evidence);
        dispute.updated_at = Utc::now();
        Ok(dispute.clone())
    }

    /// Move an open dispute to a new status and notify listeners.
    ///
    /// Moving directly to a resolved status closes the case and stamps
    /// `resolved_at`; [`DisputeManager::resolve`] is the richer path that
    /// also records liability and amount.
    pub async fn update_status(
        &self,
        dispute_id: &DisputeId,
        status: DisputeStatus,
    ) -> Result<DisputeCase> {
        let (dispute, previous) = {
            let mut store = self.store.write().await;
            let dispute = store
                .disputes
                .get_mut(dispute_id)
                .ok_or_else(|| PaySentryError::DisputeNotFound {
                    dispute_id: dispute_id.to_string(),
                })?;

            if dispute.is_closed() {
                return Err(PaySentryError::DisputeClosed {
                    dispute_id: dispute_id.to_string(),
                });
            }

            let previous = dispute.status;
            dispute.status = status;
            dispute.updated_at = Utc::now();
            if status.is_closed() {
                dispute.resolved_at = Some(dispute.updated_at);
            }
            (dispute.clone(), previous)
        };

        self.notify(&dispute, previous).await;
        Ok(dispute)
    }

    /// Close a dispute with a resolution and notify listeners
    pub async fn resolve(
        &self,
        dispute_id: &DisputeId,
        resolution: DisputeResolution,
    ) -> Result<DisputeCase> {
        if !resolution.status.is_closed() {
            return Err(PaySentryError::invalid_input(
                "status",
                format!("{} is not a resolution status", resolution.status),
            ));
        }

        let (dispute, previous) = {
            let mut store = self.store.write().await;
            let dispute = store
                .disputes
                .get_mut(dispute_id)
                .ok_or_else(|| PaySentryError::DisputeNotFound {
                    dispute_id: dispute_id.to_string(),
                })?;

            if dispute.is_closed() {
                return Err(PaySentryError::DisputeClosed {
                    dispute_id: dispute_id.to_string(),
                });
            }

            let previous = dispute.status;
            let now = Utc::now();
            dispute.status = resolution.status;
            dispute.liability = resolution.liability;
            dispute.resolved_amount = resolution.resolved_amount;
            dispute.updated_at = now;
            dispute.resolved_at = Some(now);
            (dispute.clone(), previous)
        };

        // A denied resolution settles the transaction back to completed;
        // refund resolutions leave it disputed until recovery finishes.
        if dispute.status == DisputeStatus::ResolvedDenied {
            if let Some(ledger) = &self.ledger {
                if let Err(e) =
                    ledger.set_status(&dispute.transaction_id, TransactionStatus::Completed)
                {
                    warn!(
                        transaction_id = %dispute.transaction_id,
                        error = %e,
                        "could not settle denied dispute's transaction"
                    );
                }
            }
        }

        info!(
            dispute_id = %dispute.id,
            status = %dispute.status,
            "dispute resolved"
        );
        self.notify(&dispute, previous).await;
        Ok(dispute)
    }

    async fn notify(&self, dispute: &DisputeCase, previous: DisputeStatus) {
        let listeners: Vec<Arc<dyn DisputeListener>> = self.listeners.read().clone();
        for listener in listeners {
            if let Err(e) = listener.on_status_change(dispute, previous).await {
                warn!(
                    listener = listener.name(),
                    dispute_id = %dispute.id,
                    error = %e,
                    "dispute listener failed"
                );
            }
        }
    }

    /// Look up a dispute by id
    pub async fn get(&self, dispute_id: &DisputeId) -> Option<DisputeCase> {
        self.store.read().await.disputes.get(dispute_id).cloned()
    }

    /// All disputes against a transaction, newest-first
    pub async fn get_by_transaction(&self, transaction_id: &TransactionId) -> Vec<DisputeCase> {
        self.query(&DisputeFilter {
            transaction_id: Some(transaction_id.clone()),
            ..Default::default()
        })
        .await
    }

    /// All disputes filed by an agent, newest-first
    pub async fn get_by_agent(&self, agent_id: &str) -> Vec<DisputeCase> {
        self.query(&DisputeFilter {
            agent_id: Some(agent_id.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Query disputes with AND semantics, newest-first, truncated to `limit`
    pub async fn query(&self, filter: &DisputeFilter) -> Vec<DisputeCase> {
        let store = self.store.read().await;
        let mut out = Vec::new();
        for id in store.order.iter().rev() {
            let Some(dispute) = store.disputes.get(id) else {
                continue;
            };
            if let Some(status) = filter.status {
                if dispute.status != status {
                    continue;
                }
            }
            if let Some(agent) = &filter.agent_id {
                if &dispute.agent_id != agent {
                    continue;
                }
            }
            if let Some(tx) = &filter.transaction_id {
                if &dispute.transaction_id != tx {
                    continue;
                }
            }
            if let Some(liability) = filter.liability {
                if dispute.liability != liability {
                    continue;
                }
            }
            out.push(dispute.clone());
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// Aggregate statistics over all cases
    pub async fn get_stats(&self) -> DisputeStats {
        let store = self.store.read().await;
        let mut stats = DisputeStats::default();
        for dispute in store.disputes.values() {
            stats.total += 1;
            if !dispute.is_closed() {
                stats.open += 1;
            }
            *stats.by_status.entry(dispute.status.to_string()).or_default() += 1;
            stats.total_requested += dispute.requested_amount;
            if let Some(resolved) = dispute.resolved_amount {
                stats.total_resolved += resolved;
            }
        }
        stats
    }
}

impl Default for DisputeManager {
    fn default() -> Self {
        Self::new()
    }
}
