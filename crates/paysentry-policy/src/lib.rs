//! PaySentry Policy - Deterministic spend policy evaluation
//!
//! The policy engine answers *allow?* for every proposed payment. Evaluation
//! is deterministic: given the same bucket state, cooldown state and clock
//! reading, the same transaction always yields the same decision. The engine
//! never raises on domain input; rejections are decisions, not errors.
//!
//! Evaluation order per policy: budgets, then cooldown, then the rule scan
//! (enabled rules in ascending priority, stable on ties). Decisions across
//! policies combine by restrictiveness: deny < require_approval < flag <
//! allow.
//!
//! Budget buckets are mutated only by [`PolicyEngine::record_transaction`]
//! and [`PolicyEngine::reset`], so callers can defer budget consumption
//! until settlement succeeds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use paysentry_types::{
    BudgetLimit, BudgetWindow, CurrentSpend, PolicyDecision, SpendPolicy, Transaction,
};

/// Accumulated settled spend for one `policy ⨯ scope ⨯ window ⨯ windowKey`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetBucket {
    /// Settled amount recorded into the bucket
    pub amount: Decimal,
    /// Number of recorded transactions
    pub count: u64,
}

#[derive(Default)]
struct EngineState {
    policies: Vec<SpendPolicy>,
    buckets: HashMap<String, BudgetBucket>,
    last_tx_time: HashMap<String, DateTime<Utc>>,
}

/// The PaySentry policy engine
#[derive(Default)]
pub struct PolicyEngine {
    state: RwLock<EngineState>,
}

impl PolicyEngine {
    /// Create an engine with no policies loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy, replacing any existing policy with the same id.
    ///
    /// Policies evaluate in load order; replacement keeps the original
    /// position.
    pub fn load_policy(&self, policy: SpendPolicy) {
        let mut state = self.state.write();
        info!(policy_id = %policy.id, rules = policy.rules.len(), "policy loaded");
        if let Some(existing) = state.policies.iter_mut().find(|p| p.id == policy.id) {
            *existing = policy;
        } else {
            state.policies.push(policy);
        }
    }

    /// Remove a policy by id. Unknown ids are not an error.
    pub fn remove_policy(&self, policy_id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.policies.len();
        state.policies.retain(|p| p.id != policy_id);
        state.policies.len() != before
    }

    /// Snapshot of the loaded policies, in evaluation order
    pub fn get_policies(&self) -> Vec<SpendPolicy> {
        self.state.read().policies.clone()
    }

    /// Evaluate a transaction against every enabled policy, now
    pub fn evaluate(&self, tx: &Transaction) -> PolicyDecision {
        self.evaluate_at(tx, Utc::now())
    }

    /// Evaluate at an explicit clock reading.
    ///
    /// Exposed so callers (and tests) can pin the window and cooldown
    /// arithmetic to a reference instant.
    pub fn evaluate_at(&self, tx: &Transaction, at: DateTime<Utc>) -> PolicyDecision {
        let state = self.state.read();

        let mut decisions: Vec<PolicyDecision> = Vec::new();
        for policy in state.policies.iter().filter(|p| p.enabled) {
            decisions.push(Self::evaluate_policy(policy, tx, at, &state));
        }

        // Most restrictive wins; ties keep the earliest policy.
        match decisions.into_iter().min_by_key(|d| d.action.severity_rank()) {
            Some(decision) => {
                debug!(
                    transaction_id = %tx.id,
                    action = %decision.action,
                    reason = %decision.reason,
                    "policy evaluation"
                );
                decision
            }
            None => PolicyDecision::allow("no policies loaded"),
        }
    }

    fn evaluate_policy(
        policy: &SpendPolicy,
        tx: &Transaction,
        at: DateTime<Utc>,
        state: &EngineState,
    ) -> PolicyDecision {
        // 1. Budgets: deny on the first limit the projected spend would cross.
        for budget in policy.budgets.iter().filter(|b| b.matches(tx)) {
            let current = match budget.window {
                // Each evaluation is its own window, nothing carries over.
                BudgetWindow::PerTransaction => Decimal::ZERO,
                _ => state
                    .buckets
                    .get(&bucket_key(&policy.id, budget, at))
                    .map(|b| b.amount)
                    .unwrap_or(Decimal::ZERO),
            };
            let projected = current + tx.amount;
            if projected > budget.max_amount {
                return PolicyDecision::deny(format!(
                    "{} budget exceeded: {} + {} > {}",
                    budget.window, current, tx.amount, budget.max_amount
                ))
                .with_policy(&policy.id)
                .with_details(json!({
                    "window": budget.window.to_string(),
                    "maxAmount": budget.max_amount,
                    "currentAmount": current,
                    "projectedAmount": projected,
                }));
            }
        }

        // 2. Cooldown: a gap of exactly `cooldown_ms` is allowed.
        if let Some(cooldown_ms) = policy.cooldown_ms {
            if let Some(last) = state.last_tx_time.get(&tx.agent_id) {
                let elapsed_ms = (at - *last).num_milliseconds();
                if elapsed_ms < cooldown_ms as i64 {
                    let remaining_ms = cooldown_ms as i64 - elapsed_ms;
                    return PolicyDecision::deny(format!(
                        "Cooldown active for agent {}: {}ms remaining",
                        tx.agent_id, remaining_ms
                    ))
                    .with_policy(&policy.id)
                    .with_details(json!({
                        "cooldownMs": cooldown_ms,
                        "remainingMs": remaining_ms,
                    }));
                }
            }
        }

        // 3. Rule scan: first enabled match wins; ties keep load order.
        let mut rules: Vec<_> = policy.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by_key(|r| r.priority);
        for rule in rules {
            if rule.conditions.matches(tx) {
                let label = rule.name.as_deref().unwrap_or(&rule.id);
                return PolicyDecision::from_action(
                    rule.action,
                    format!("rule {} matched", label),
                )
                .with_policy(&policy.id)
                .with_rule(&rule.id);
            }
        }

        PolicyDecision::allow("no matching rules").with_policy(&policy.id)
    }

    /// Record a settled transaction into every matching budget bucket and
    /// stamp the agent's cooldown clock.
    ///
    /// This is the only path that mutates buckets; it is deliberately
    /// independent of [`PolicyEngine::evaluate`] so callers can record only
    /// after external execution succeeds.
    pub fn record_transaction(&self, tx: &Transaction) {
        self.record_transaction_at(tx, Utc::now());
    }

    /// Record at an explicit clock reading
    pub fn record_transaction_at(&self, tx: &Transaction, at: DateTime<Utc>) {
        let mut state = self.state.write();

        let mut increments: Vec<String> = Vec::new();
        for policy in state.policies.iter().filter(|p| p.enabled) {
            for budget in policy.budgets.iter().filter(|b| b.matches(tx)) {
                increments.push(bucket_key(&policy.id, budget, at));
            }
        }
        for key in increments {
            let bucket = state.buckets.entry(key).or_default();
            bucket.amount += tx.amount;
            bucket.count += 1;
        }

        state.last_tx_time.insert(tx.agent_id.clone(), at);
    }

    /// Current consumption of one budget's bucket at a reference instant
    pub fn current_spend(
        &self,
        policy_id: &str,
        budget: &BudgetLimit,
        reference: Option<DateTime<Utc>>,
    ) -> CurrentSpend {
        let at = reference.unwrap_or_else(Utc::now);
        let state = self.state.read();
        let bucket = state
            .buckets
            .get(&bucket_key(policy_id, budget, at))
            .copied()
            .unwrap_or_default();
        CurrentSpend {
            amount: bucket.amount,
            count: bucket.count,
        }
    }

    /// Clear every bucket and cooldown clock, keeping loaded policies.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.buckets.clear();
        state.last_tx_time.clear();
        info!("policy engine spend state reset");
    }
}

fn bucket_key(policy_id: &str, budget: &BudgetLimit, at: DateTime<Utc>) -> String {
    format!(
        "{}::{}::{}::{}",
        policy_id,
        budget.scope_key(),
        budget.window,
        budget.window.window_key(at)
    )
}
