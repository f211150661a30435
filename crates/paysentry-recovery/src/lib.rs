//! PaySentry Recovery - Refund queue with retry
//!
//! When a dispute resolves in the agent's favor, the recovery engine
//! queues a refund action and drives it against an external executor with
//! linear backoff. The engine only ever moves its own records and the
//! refunded transaction's status; the executor is the one touching money.
//!
//! # Invariants
//!
//! 1. Recovery can only be initiated from a refund-favoring resolution
//! 2. At most one non-terminal recovery per dispute
//! 3. The executor is called at most `max_retries` times per queue run
//! 4. Actions are attempted in FIFO enqueue order

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use paysentry_disputes::DisputeManager;
use paysentry_ledger::SpendLedger;
use paysentry_types::{
    DisputeId, DisputeStatus, PaySentryError, PaymentProtocol, RecoveryAction, RecoveryId,
    RecoveryStats, RecoveryStatus, RecoveryType, RefundResult, Result, TransactionStatus,
};

/// Executor that actually returns funds
///
/// May yield and may raise; a raise counts as a failed attempt.
#[async_trait]
pub trait RefundExecutor: Send + Sync {
    /// Attempt one refund
    async fn execute(&self, action: &RecoveryAction) -> Result<RefundResult>;
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum executor attempts per action per queue run
    pub max_retries: u32,
    /// Base delay between attempts; attempt N waits N times this
    pub retry_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
        }
    }
}

#[derive(Default)]
struct RecoveryStore {
    actions: HashMap<RecoveryId, RecoveryAction>,
    order: Vec<RecoveryId>,
    queue: VecDeque<RecoveryId>,
}

/// The PaySentry recovery engine
pub struct RecoveryEngine {
    disputes: Arc<DisputeManager>,
    ledger: Option<Arc<SpendLedger>>,
    executor: Arc<dyn RefundExecutor>,
    config: RecoveryConfig,
    store: RwLock<RecoveryStore>,
}

impl RecoveryEngine {
    /// Create an engine with default retry configuration
    pub fn new(disputes: Arc<DisputeManager>, executor: Arc<dyn RefundExecutor>) -> Self {
        Self::with_config(disputes, executor, RecoveryConfig::default())
    }

    /// Create an engine with explicit retry configuration
    pub fn with_config(
        disputes: Arc<DisputeManager>,
        executor: Arc<dyn RefundExecutor>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            disputes,
            ledger: None,
            executor,
            config,
            store: RwLock::new(RecoveryStore::default()),
        }
    }

    /// Attach a ledger: completed refunds move the transaction to refunded
    pub fn with_ledger(mut self, ledger: Arc<SpendLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Queue a refund for a resolved dispute.
    ///
    /// The amount is the dispute's resolved amount when set, otherwise the
    /// requested amount. A partial resolution produces a partial refund;
    /// a full resolution produces a chargeback for card transactions, a
    /// credit when the ledger has no record to reverse, and a full refund
    /// otherwise.
    pub async fn initiate(&self, dispute_id: &DisputeId) -> Result<RecoveryAction> {
        let dispute = self
            .disputes
            .get(dispute_id)
            .await
            .ok_or_else(|| PaySentryError::DisputeNotFound {
                dispute_id: dispute_id.to_string(),
            })?;

        if !dispute.status.is_refund() {
            return Err(PaySentryError::DisputeNotRefundable {
                dispute_id: dispute_id.to_string(),
                status: dispute.status.to_string(),
            });
        }

        let mut store = self.store.write().await;
        if let Some(active) = store
            .actions
            .values()
            .find(|a| &a.dispute_id == dispute_id && !a.status.is_terminal())
        {
            return Err(PaySentryError::RecoveryAlreadyActive {
                dispute_id: dispute_id.to_string(),
                recovery_id: active.id.to_string(),
            });
        }

        let amount = dispute.resolved_amount.unwrap_or(dispute.requested_amount);
        let disputed_tx = self
            .ledger
            .as_ref()
            .and_then(|l| l.get(&dispute.transaction_id));
        let recovery_type = if dispute.status == DisputeStatus::ResolvedPartial {
            RecoveryType::PartialRefund
        } else {
            match &disputed_tx {
                Some(tx) if tx.protocol == PaymentProtocol::Card => RecoveryType::Chargeback,
                Some(_) => RecoveryType::FullRefund,
                // Nothing in the ledger to reverse: make the agent whole
                // with new funds instead.
                None if self.ledger.is_some() => RecoveryType::Credit,
                None => RecoveryType::FullRefund,
            }
        };
        let currency = disputed_tx
            .map(|tx| tx.currency)
            .unwrap_or_else(|| "USDC".to_string());

        let now = Utc::now();
        let action = RecoveryAction {
            id: RecoveryId::new(),
            dispute_id: dispute.id.clone(),
            transaction_id: dispute.transaction_id.clone(),
            agent_id: dispute.agent_id.clone(),
            recovery_type,
            amount,
            currency,
            status: RecoveryStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            refund_tx_id: None,
            error: None,
        };

        store.order.push(action.id.clone());
        store.queue.push_back(action.id.clone());
        store.actions.insert(action.id.clone(), action.clone());

        info!(
            recovery_id = %action.id,
            dispute_id = %dispute.id,
            amount = %action.amount,
            "recovery queued"
        );
        Ok(action)
    }

    /// Drain the queue, attempting each action in FIFO order.
    ///
    /// Each non-cancelled action gets up to `max_retries` executor attempts
    /// with a wait of `retry_delay_ms × attempt` between attempts (none
    /// after the last). Returns the processed actions in queue order.
    pub async fn process_queue(&self) -> Vec<RecoveryAction> {
        let drained: Vec<RecoveryId> = {
            let mut store = self.store.write().await;
            store.queue.drain(..).collect()
        };

        let mut processed = Vec::new();
        for id in drained {
            let Some(mut action) = self.checkout(&id).await else {
                continue;
            };
            if action.status == RecoveryStatus::Cancelled {
                continue;
            }

            action.mark(RecoveryStatus::Processing);
            self.write_back(&action).await;

            let mut succeeded = false;
            for attempt in 1..=self.config.max_retries {
                match self.executor.execute(&action).await {
                    Ok(result) if result.success => {
                        action.refund_tx_id = result.refund_tx_id;
                        action.completed_at = Some(Utc::now());
                        action.error = None;
                        action.mark(RecoveryStatus::Completed);
                        succeeded = true;
                        break;
                    }
                    Ok(result) => {
                        action.error =
                            Some(result.error.unwrap_or_else(|| "refund rejected".to_string()));
                    }
                    Err(e) => {
                        action.error = Some(e.to_string());
                    }
                }

                if attempt < self.config.max_retries {
                    // Linear backoff starting at one base delay.
                    sleep(Duration::from_millis(
                        self.config.retry_delay_ms * attempt as u64,
                    ))
                    .await;
                }
            }

            if succeeded {
                info!(
                    recovery_id = %action.id,
                    refund_tx_id = action.refund_tx_id.as_deref().unwrap_or(""),
                    "recovery completed"
                );
                if let Some(ledger) = &self.ledger {
                    if let Err(e) =
                        ledger.set_status(&action.transaction_id, TransactionStatus::Refunded)
                    {
                        warn!(
                            transaction_id = %action.transaction_id,
                            error = %e,
                            "could not mark transaction refunded"
                        );
                    }
                }
            } else {
                action.mark(RecoveryStatus::Failed);
                warn!(
                    recovery_id = %action.id,
                    error = action.error.as_deref().unwrap_or(""),
                    "recovery failed after retries"
                );
            }

            self.write_back(&action).await;
            processed.push(action);
        }

        processed
    }

    async fn checkout(&self, id: &RecoveryId) -> Option<RecoveryAction> {
        self.store.read().await.actions.get(id).cloned()
    }

    async fn write_back(&self, action: &RecoveryAction) {
        self.store
            .write()
            .await
            .actions
            .insert(action.id.clone(), action.clone());
    }

    /// Cancel a pending action
    pub async fn cancel(&self, recovery_id: &RecoveryId) -> Result<RecoveryAction> {
        let mut store = self.store.write().await;
        let action = store
            .actions
            .get_mut(recovery_id)
            .ok_or_else(|| PaySentryError::RecoveryNotFound {
                recovery_id: recovery_id.to_string(),
            })?;

        if action.status != RecoveryStatus::Pending {
            return Err(PaySentryError::RecoveryNotCancellable {
                recovery_id: recovery_id.to_string(),
                status: action.status.to_string(),
            });
        }

        action.mark(RecoveryStatus::Cancelled);
        Ok(action.clone())
    }

    /// Look up an action by id
    pub async fn get(&self, recovery_id: &RecoveryId) -> Option<RecoveryAction> {
        self.store.read().await.actions.get(recovery_id).cloned()
    }

    /// All actions for a dispute, newest-first
    pub async fn get_by_dispute(&self, dispute_id: &DisputeId) -> Vec<RecoveryAction> {
        let store = self.store.read().await;
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.actions.get(id))
            .filter(|a| &a.dispute_id == dispute_id)
            .cloned()
            .collect()
    }

    /// All actions, optionally filtered by status, newest-first
    pub async fn get_all(&self, status: Option<RecoveryStatus>) -> Vec<RecoveryAction> {
        let store = self.store.read().await;
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.actions.get(id))
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect()
    }

    /// Aggregate statistics over all actions
    pub async fn get_stats(&self) -> RecoveryStats {
        let store = self.store.read().await;
        let mut stats = RecoveryStats {
            queued: store.queue.len(),
            ..Default::default()
        };
        for action in store.actions.values() {
            stats.total += 1;
            *stats.by_status.entry(action.status.to_string()).or_default() += 1;
            if action.status == RecoveryStatus::Completed {
                stats.total_recovered += action.amount;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use paysentry_disputes::DisputeResolution;
    use paysentry_types::{
        FileDisputeInput, LiabilityParty, PaymentProtocol, Transaction, TransactionId,
    };
    use rust_decimal_macros::dec;

    /// Executor that fails a configured number of times, then succeeds.
    struct FlakyExecutor {
        fail_first: u32,
        calls: Mutex<u32>,
    }

    impl FlakyExecutor {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl RefundExecutor for FlakyExecutor {
        async fn execute(&self, action: &RecoveryAction) -> Result<RefundResult> {
            let mut calls = self.calls.lock();
            *calls += 1;
            if *calls <= self.fail_first {
                Ok(RefundResult::failed("temporarily unavailable"))
            } else {
                Ok(RefundResult::ok(format!("refund-{}", action.id)))
            }
        }
    }

    /// Executor that raises on every call.
    struct RaisingExecutor;

    #[async_trait]
    impl RefundExecutor for RaisingExecutor {
        async fn execute(&self, _action: &RecoveryAction) -> Result<RefundResult> {
            Err(PaySentryError::facilitator("connection refused"))
        }
    }

    fn fast_config() -> RecoveryConfig {
        RecoveryConfig {
            max_retries: 3,
            retry_delay_ms: 1,
        }
    }

    async fn resolved_dispute(
        disputes: &DisputeManager,
        status: DisputeStatus,
        resolved_amount: Option<rust_decimal::Decimal>,
    ) -> DisputeId {
        let dispute = disputes
            .file(FileDisputeInput {
                transaction_id: TransactionId::new(),
                agent_id: "agent-1".to_string(),
                reason: "not delivered".to_string(),
                requested_amount: dec!(25),
                evidence: vec![],
            })
            .await
            .unwrap();
        disputes
            .resolve(
                &dispute.id,
                DisputeResolution {
                    status,
                    liability: LiabilityParty::ServiceProvider,
                    resolved_amount,
                },
            )
            .await
            .unwrap();
        dispute.id
    }

    #[tokio::test]
    async fn test_initiate_requires_refund_resolution() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        // Open dispute: not refundable yet.
        let open = disputes
            .file(FileDisputeInput {
                transaction_id: TransactionId::new(),
                agent_id: "agent-1".to_string(),
                reason: "not delivered".to_string(),
                requested_amount: dec!(25),
                evidence: vec![],
            })
            .await
            .unwrap();
        let err = engine.initiate(&open.id).await.unwrap_err();
        assert!(matches!(err, PaySentryError::DisputeNotRefundable { .. }));

        // Denied resolution: still not refundable.
        let denied =
            resolved_dispute(&disputes, DisputeStatus::ResolvedDenied, None).await;
        let err = engine.initiate(&denied).await.unwrap_err();
        assert!(matches!(err, PaySentryError::DisputeNotRefundable { .. }));
    }

    #[tokio::test]
    async fn test_initiate_amount_and_type() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        let full =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        let action = engine.initiate(&full).await.unwrap();
        assert_eq!(action.recovery_type, RecoveryType::FullRefund);
        assert_eq!(action.amount, dec!(25));
        assert_eq!(action.status, RecoveryStatus::Pending);
        assert!(action.id.as_str().starts_with("rcv_"));

        // Partial resolution refunds the resolved amount, not the requested one.
        let partial =
            resolved_dispute(&disputes, DisputeStatus::ResolvedPartial, Some(dec!(10))).await;
        let action = engine.initiate(&partial).await.unwrap();
        assert_eq!(action.recovery_type, RecoveryType::PartialRefund);
        assert_eq!(action.amount, dec!(10));

        // Without a resolved amount the requested amount is refunded.
        let fallback =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, None).await;
        let action = engine.initiate(&fallback).await.unwrap();
        assert_eq!(action.amount, dec!(25));
    }

    #[tokio::test]
    async fn test_one_active_recovery_per_dispute() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        engine.initiate(&dispute_id).await.unwrap();
        let err = engine.initiate(&dispute_id).await.unwrap_err();
        assert!(matches!(err, PaySentryError::RecoveryAlreadyActive { .. }));

        // After processing completes the action, a new one may be initiated.
        engine.process_queue().await;
        assert!(engine.initiate(&dispute_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_process_queue_success() {
        let disputes = Arc::new(DisputeManager::new());
        let executor = Arc::new(FlakyExecutor::new(0));
        let engine =
            RecoveryEngine::with_config(disputes.clone(), executor.clone(), fast_config());

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        let action = engine.initiate(&dispute_id).await.unwrap();

        let processed = engine.process_queue().await;
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].status, RecoveryStatus::Completed);
        assert!(processed[0].refund_tx_id.is_some());
        assert!(processed[0].completed_at.is_some());
        assert_eq!(executor.calls(), 1);

        let stored = engine.get(&action.id).await.unwrap();
        assert_eq!(stored.status, RecoveryStatus::Completed);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let disputes = Arc::new(DisputeManager::new());
        let executor = Arc::new(FlakyExecutor::new(2));
        let engine =
            RecoveryEngine::with_config(disputes.clone(), executor.clone(), fast_config());

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        engine.initiate(&dispute_id).await.unwrap();

        let processed = engine.process_queue().await;
        assert_eq!(processed[0].status, RecoveryStatus::Completed);
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_with_error() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(RaisingExecutor),
            fast_config(),
        );

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        engine.initiate(&dispute_id).await.unwrap();

        let processed = engine.process_queue().await;
        assert_eq!(processed[0].status, RecoveryStatus::Failed);
        assert!(processed[0].error.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_executor_called_at_most_max_retries() {
        let disputes = Arc::new(DisputeManager::new());
        let executor = Arc::new(FlakyExecutor::new(100));
        let engine =
            RecoveryEngine::with_config(disputes.clone(), executor.clone(), fast_config());

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        engine.initiate(&dispute_id).await.unwrap();

        engine.process_queue().await;
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        let action = engine.initiate(&dispute_id).await.unwrap();

        let cancelled = engine.cancel(&action.id).await.unwrap();
        assert_eq!(cancelled.status, RecoveryStatus::Cancelled);

        // Cancelled actions are skipped when the queue drains.
        let processed = engine.process_queue().await;
        assert!(processed.is_empty());

        // Completed/cancelled actions cannot be cancelled again.
        let err = engine.cancel(&action.id).await.unwrap_err();
        assert!(matches!(err, PaySentryError::RecoveryNotCancellable { .. }));
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        let first =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(1))).await;
        let second =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(2))).await;
        let a = engine.initiate(&first).await.unwrap();
        let b = engine.initiate(&second).await.unwrap();

        let processed = engine.process_queue().await;
        assert_eq!(processed.len(), 2);
        assert_eq!(processed[0].id, a.id);
        assert_eq!(processed[1].id, b.id);
    }

    #[tokio::test]
    async fn test_completed_refund_marks_transaction_refunded() {
        let ledger = Arc::new(SpendLedger::new());
        let mut tx = Transaction::new(
            "agent-1",
            "merchant-a",
            dec!(25),
            "EUR",
            "test",
            PaymentProtocol::X402,
        );
        tx.mark(TransactionStatus::Approved);
        tx.mark(TransactionStatus::Executing);
        tx.mark(TransactionStatus::Completed);
        let tx_id = tx.id.clone();
        ledger.record(tx);

        let disputes = Arc::new(DisputeManager::new().with_ledger(ledger.clone()));
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        )
        .with_ledger(ledger.clone());

        let dispute = disputes
            .file(FileDisputeInput {
                transaction_id: tx_id.clone(),
                agent_id: "agent-1".to_string(),
                reason: "not delivered".to_string(),
                requested_amount: dec!(25),
                evidence: vec![],
            })
            .await
            .unwrap();
        disputes
            .resolve(
                &dispute.id,
                DisputeResolution {
                    status: DisputeStatus::ResolvedRefunded,
                    liability: LiabilityParty::ServiceProvider,
                    resolved_amount: Some(dec!(25)),
                },
            )
            .await
            .unwrap();

        let action = engine.initiate(&dispute.id).await.unwrap();
        // Currency came from the ledger transaction.
        assert_eq!(action.currency, "EUR");
        assert_eq!(action.recovery_type, RecoveryType::FullRefund);

        engine.process_queue().await;
        assert_eq!(ledger.get(&tx_id).unwrap().status, TransactionStatus::Refunded);
    }

    #[tokio::test]
    async fn test_card_transactions_recover_via_chargeback() {
        let ledger = Arc::new(SpendLedger::new());
        let mut tx = Transaction::new(
            "agent-1",
            "merchant-a",
            dec!(40),
            "USD",
            "test",
            PaymentProtocol::Card,
        );
        tx.mark(TransactionStatus::Approved);
        tx.mark(TransactionStatus::Executing);
        tx.mark(TransactionStatus::Completed);
        let tx_id = tx.id.clone();
        ledger.record(tx);

        let disputes = Arc::new(DisputeManager::new().with_ledger(ledger.clone()));
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        )
        .with_ledger(ledger);

        let dispute = disputes
            .file(FileDisputeInput {
                transaction_id: tx_id,
                agent_id: "agent-1".to_string(),
                reason: "duplicate charge".to_string(),
                requested_amount: dec!(40),
                evidence: vec![],
            })
            .await
            .unwrap();
        disputes
            .resolve(
                &dispute.id,
                DisputeResolution {
                    status: DisputeStatus::ResolvedRefunded,
                    liability: LiabilityParty::ServiceProvider,
                    resolved_amount: Some(dec!(40)),
                },
            )
            .await
            .unwrap();

        let action = engine.initiate(&dispute.id).await.unwrap();
        assert_eq!(action.recovery_type, RecoveryType::Chargeback);
        assert_eq!(action.currency, "USD");
    }

    #[tokio::test]
    async fn test_untracked_transaction_recovers_via_credit() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        )
        .with_ledger(Arc::new(SpendLedger::new()));

        // The disputed transaction never reached the ledger: there is no
        // settlement to reverse, so the agent is made whole with a credit.
        let dispute_id =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(25))).await;
        let action = engine.initiate(&dispute_id).await.unwrap();
        assert_eq!(action.recovery_type, RecoveryType::Credit);
        assert_eq!(action.amount, dec!(25));
    }

    #[tokio::test]
    async fn test_stats() {
        let disputes = Arc::new(DisputeManager::new());
        let engine = RecoveryEngine::with_config(
            disputes.clone(),
            Arc::new(FlakyExecutor::new(0)),
            fast_config(),
        );

        let first =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(10))).await;
        let second =
            resolved_dispute(&disputes, DisputeStatus::ResolvedRefunded, Some(dec!(5))).await;
        engine.initiate(&first).await.unwrap();
        let pending = engine.initiate(&second).await.unwrap();
        engine.cancel(&pending.id).await.unwrap();

        engine.process_queue().await;

        let stats = engine.get_stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status["completed"], 1);
        assert_eq!(stats.by_status["cancelled"], 1);
        assert_eq!(stats.total_recovered, dec!(10));
        assert_eq!(stats.queued, 0);

        let completed = engine.get_all(Some(RecoveryStatus::Completed)).await;
        assert_eq!(completed.len(), 1);
    }
}
