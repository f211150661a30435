//! PaySentry Facilitator - Policy-gated protocol wrapper
//!
//! The adapter stands between an agent and an external payment
//! facilitator. Every verify is policy-gated before the facilitator sees
//! it, every settle is tracked into the spend ledger and provenance log,
//! and all facilitator traffic runs through a per-operation circuit
//! breaker.
//!
//! Budget consumption is deliberately asymmetric: settlements are recorded
//! in the ledger whether they succeed or fail, but
//! [`paysentry_policy::PolicyEngine::record_transaction`] runs only on
//! success, so budgets count settled funds only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};

use paysentry_alerts::AlertEvaluator;
use paysentry_breaker::CircuitBreaker;
use paysentry_ledger::SpendLedger;
use paysentry_policy::PolicyEngine;
use paysentry_provenance::ProvenanceLog;
use paysentry_types::{ProvenanceOutcome, Result, Transaction, TransactionStatus};

pub mod extract;
pub mod wire;

pub use extract::{transaction_key, DefaultExtractor, TransactionExtractor};
pub use wire::{
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedResponse, VerifyResponse,
};

/// External payment facilitator
///
/// All three operations may yield and may raise.
#[async_trait]
pub trait FacilitatorClient: Send + Sync {
    /// Check a payment payload against requirements
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse>;

    /// Execute the payment
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse>;

    /// List supported schemes and networks
    async fn supported(&self) -> Result<SupportedResponse>;
}

/// External approval decision for `require_approval` policy outcomes
///
/// Consumed by approval-gating collaborators (HTTP middleware and the
/// like) that hold a payment until a human or upstream system answers;
/// the adapter itself surfaces `require_approval` as a policy rejection.
/// Decisions should be recorded through
/// [`ProvenanceLog::record_approval`].
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Whether the transaction may proceed
    async fn approve(&self, tx: &Transaction) -> bool;
}

/// Adapter configuration
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Breaker key prefix; operations key as `<facilitator_key>:verify`
    /// and `<facilitator_key>:settle`
    pub facilitator_key: String,
    /// Prefix on policy rejection reasons returned to the caller
    pub rejection_prefix: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            facilitator_key: "facilitator".to_string(),
            rejection_prefix: "Payment blocked by policy".to_string(),
        }
    }
}

/// The PaySentry facilitator adapter
pub struct FacilitatorAdapter {
    client: Arc<dyn FacilitatorClient>,
    policy: Arc<PolicyEngine>,
    ledger: Arc<SpendLedger>,
    provenance: Arc<ProvenanceLog>,
    breaker: Arc<CircuitBreaker>,
    alerts: Option<Arc<AlertEvaluator>>,
    extractor: Arc<dyn TransactionExtractor>,
    config: AdapterConfig,
    /// Derived transactions by de-duplication key, so verify and settle of
    /// the same request share one internal transaction
    derived: Mutex<HashMap<String, Transaction>>,
}

impl FacilitatorAdapter {
    /// Wrap a facilitator client
    pub fn new(
        client: Arc<dyn FacilitatorClient>,
        policy: Arc<PolicyEngine>,
        ledger: Arc<SpendLedger>,
        provenance: Arc<ProvenanceLog>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            client,
            policy,
            ledger,
            provenance,
            breaker,
            alerts: None,
            extractor: Arc::new(DefaultExtractor::default()),
            config: AdapterConfig::default(),
            derived: Mutex::new(HashMap::new()),
        }
    }

    /// Attach an alert evaluator, run against every settlement
    pub fn with_alerts(mut self, alerts: Arc<AlertEvaluator>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Replace the transaction extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn TransactionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the adapter configuration
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Derive (or reuse) the internal transaction for a request.
    ///
    /// The first derivation records the intent provenance stage; later
    /// calls with the same key reuse the cached transaction so the chain
    /// stays on one id.
    fn derive(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Transaction {
        let key = transaction_key(payload, requirements);
        let mut derived = self.derived.lock();
        if let Some(tx) = derived.get(&key) {
            return tx.clone();
        }

        let tx = self.extractor.extract(payload, requirements);
        self.provenance.record_intent(
            &tx.id,
            "payment intent derived",
            json!({
                "agentId": tx.agent_id,
                "recipient": tx.recipient,
                "amount": tx.amount,
                "currency": tx.currency,
                "transactionKey": key,
            }),
        );
        derived.insert(key, tx.clone());
        tx
    }

    fn cache(&self, payload: &PaymentPayload, requirements: &PaymentRequirements, tx: &Transaction) {
        self.derived
            .lock()
            .insert(transaction_key(payload, requirements), tx.clone());
    }

    /// Policy-gated verify.
    ///
    /// A policy rejection returns the facilitator's negative reply shape
    /// instead of raising, and the wrapped facilitator is not called. An
    /// allowed request is forwarded through the circuit breaker; a
    /// breaker-open error propagates unchanged.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        let mut tx = self.derive(payload, requirements);

        let decision = self.policy.evaluate(&tx);
        let outcome = if decision.allowed {
            ProvenanceOutcome::Pass
        } else {
            ProvenanceOutcome::Fail
        };
        self.provenance.record_policy_check(
            &tx.id,
            outcome,
            json!({
                "action": decision.action.to_string(),
                "reason": decision.reason,
                "policyId": decision.policy_id,
                "ruleId": decision.rule_id,
            }),
        );

        if !decision.allowed {
            info!(
                transaction_id = %tx.id,
                reason = %decision.reason,
                "verify blocked by policy"
            );
            if tx.status == TransactionStatus::Pending {
                tx.mark(TransactionStatus::Rejected);
                self.cache(payload, requirements, &tx);
            }
            return Ok(VerifyResponse::invalid(format!(
                "{}: {}",
                self.config.rejection_prefix, decision.reason
            )));
        }

        if tx.status == TransactionStatus::Pending {
            tx.mark(TransactionStatus::Approved);
            self.cache(payload, requirements, &tx);
        }

        let key = format!("{}:verify", self.config.facilitator_key);
        self.breaker
            .execute(&key, || self.client.verify(payload, requirements))
            .await
    }

    /// Tracked settle.
    ///
    /// The settlement result, success or failure, is recorded in the
    /// spend ledger and provenance log and evaluated for alerts; budgets
    /// are only charged on success. Facilitator exceptions other than
    /// breaker-open are re-raised after the failure is recorded.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse> {
        let mut tx = self.derive(payload, requirements);

        self.provenance.record_execution(
            &tx.id,
            "settle requested",
            json!({
                "scheme": requirements.scheme,
                "network": requirements.network,
            }),
        );

        if tx.status == TransactionStatus::Pending {
            tx.mark(TransactionStatus::Approved);
        }
        if tx.status == TransactionStatus::Approved {
            tx.mark(TransactionStatus::Executing);
        }
        self.cache(payload, requirements, &tx);

        let key = format!("{}:settle", self.config.facilitator_key);
        let reply = match self
            .breaker
            .execute(&key, || self.client.settle(payload, requirements))
            .await
        {
            Ok(reply) => reply,
            Err(e) if e.is_breaker_open() => return Err(e),
            Err(e) => {
                // Record the failed settlement before re-raising.
                warn!(transaction_id = %tx.id, error = %e, "settlement raised");
                tx.mark(TransactionStatus::Failed);
                self.cache(payload, requirements, &tx);
                self.ledger.record(tx.clone());
                self.provenance.record_settlement(
                    &tx.id,
                    ProvenanceOutcome::Fail,
                    json!({ "error": e.to_string() }),
                );
                return Err(e);
            }
        };

        if reply.success {
            tx.mark(TransactionStatus::Completed);
        } else {
            tx.mark(TransactionStatus::Failed);
        }
        if let Some(hash) = &reply.tx_hash {
            tx.set_protocol_tx_id(hash.clone());
        }
        self.cache(payload, requirements, &tx);
        self.ledger.record(tx.clone());

        let outcome = if reply.success {
            ProvenanceOutcome::Pass
        } else {
            ProvenanceOutcome::Fail
        };
        self.provenance.record_settlement(
            &tx.id,
            outcome,
            json!({
                "txHash": reply.tx_hash,
                "network": reply.network,
                "error": reply.error,
            }),
        );

        if let Some(alerts) = &self.alerts {
            alerts.evaluate(&tx).await;
        }

        if reply.success {
            // Budgets count settled funds only.
            self.policy.record_transaction(&tx);
            info!(
                transaction_id = %tx.id,
                tx_hash = reply.tx_hash.as_deref().unwrap_or(""),
                "settlement completed"
            );
        } else {
            warn!(
                transaction_id = %tx.id,
                error = reply.error.as_deref().unwrap_or(""),
                "settlement failed"
            );
        }

        Ok(reply)
    }

    /// Direct passthrough to the facilitator's capability listing
    pub async fn supported(&self) -> Result<SupportedResponse> {
        self.client.supported().await
    }
}

/// In-memory facilitator for testing
///
/// Verifies everything, settles according to its configured mode, and
/// counts calls so tests can assert the wrapped client was (not) reached.
pub struct InMemoryFacilitator {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    verify_calls: u32,
    settle_calls: u32,
    fail_settlements: bool,
    raise_on_settle: bool,
    next_tx: u64,
}

impl InMemoryFacilitator {
    /// A facilitator that verifies and settles everything
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
        }
    }

    /// Settle calls report failure
    pub fn fail_settlements(self) -> Self {
        self.state.lock().fail_settlements = true;
        self
    }

    /// Settle calls raise instead of replying
    pub fn raise_on_settle(self) -> Self {
        self.state.lock().raise_on_settle = true;
        self
    }

    /// Number of verify calls that reached the facilitator
    pub fn verify_calls(&self) -> u32 {
        self.state.lock().verify_calls
    }

    /// Number of settle calls that reached the facilitator
    pub fn settle_calls(&self) -> u32 {
        self.state.lock().settle_calls
    }
}

impl Default for InMemoryFacilitator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FacilitatorClient for InMemoryFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        let mut state = self.state.lock();
        state.verify_calls += 1;
        Ok(VerifyResponse {
            is_valid: true,
            payer: payload.payer.clone(),
            invalid_reason: None,
        })
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<SettleResponse> {
        let mut state = self.state.lock();
        state.settle_calls += 1;
        if state.raise_on_settle {
            return Err(paysentry_types::PaySentryError::facilitator(
                "facilitator unreachable",
            ));
        }
        if state.fail_settlements {
            return Ok(SettleResponse {
                success: false,
                tx_hash: None,
                network: payload.network.clone(),
                error: Some("insufficient funds".to_string()),
            });
        }
        state.next_tx += 1;
        Ok(SettleResponse {
            success: true,
            tx_hash: Some(format!("0xsettled{:04}", state.next_tx)),
            network: payload.network.clone(),
            error: None,
        })
    }

    async fn supported(&self) -> Result<SupportedResponse> {
        Ok(SupportedResponse {
            schemes: vec!["exact".to_string()],
            networks: vec!["base-sepolia".to_string()],
        })
    }
}
