//! PaySentry Ledger - Spend tracking over the transaction stream
//!
//! The ledger is the single owner of transaction records. Everything else
//! in the control plane refers to transactions by id and looks them up here.
//!
//! # Invariants
//!
//! 1. An id appears at most once in the chronological list
//! 2. A secondary index holds exactly the ids whose transaction carries
//!    the indexed value
//! 3. Status writes follow the transaction lifecycle graph and stamp
//!    `updated_at`
//!
//! Indices are derived state: they are rebuilt from the primary map on
//! first insert and never persisted.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use paysentry_types::{
    PaySentryError, Result, Transaction, TransactionFilter, TransactionId, TransactionStatus,
};

pub mod analytics;

pub use analytics::{AgentSummary, SpendAnalytics, SpendSummary};

#[derive(Default)]
struct LedgerState {
    transactions: HashMap<TransactionId, Transaction>,
    by_agent: HashMap<String, Vec<TransactionId>>,
    by_service: HashMap<String, Vec<TransactionId>>,
    by_recipient: HashMap<String, Vec<TransactionId>>,
    chronological: Vec<TransactionId>,
    arrival: HashMap<TransactionId, u64>,
    next_arrival: u64,
}

/// The PaySentry spend ledger
///
/// Thread-safe, in-memory, designed for concurrent access. Every operation
/// completes synchronously without yielding.
#[derive(Default)]
pub struct SpendLedger {
    state: RwLock<LedgerState>,
}

impl SpendLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new transaction or update an existing one in place.
    ///
    /// First-seen inserts update every index and append to the
    /// chronological list; updates only replace the primary entry, so
    /// re-recording is idempotent in ledger size and indices.
    pub fn record(&self, tx: Transaction) {
        let mut state = self.state.write();
        if state.transactions.contains_key(&tx.id) {
            debug!(transaction_id = %tx.id, "ledger update");
            state.transactions.insert(tx.id.clone(), tx);
            return;
        }

        debug!(transaction_id = %tx.id, agent_id = %tx.agent_id, "ledger insert");
        state
            .by_agent
            .entry(tx.agent_id.clone())
            .or_default()
            .push(tx.id.clone());
        if let Some(service) = &tx.service_id {
            state
                .by_service
                .entry(service.clone())
                .or_default()
                .push(tx.id.clone());
        }
        state
            .by_recipient
            .entry(tx.recipient.clone())
            .or_default()
            .push(tx.id.clone());
        state.chronological.push(tx.id.clone());
        let seq = state.next_arrival;
        state.next_arrival += 1;
        state.arrival.insert(tx.id.clone(), seq);
        state.transactions.insert(tx.id.clone(), tx);
    }

    /// Look up a transaction by id
    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.state.read().transactions.get(id).cloned()
    }

    /// Move a transaction to a new status, stamping `updated_at`.
    ///
    /// The write is validated against the lifecycle graph; a same-status
    /// write is a no-op. Returns the updated transaction.
    pub fn set_status(&self, id: &TransactionId, status: TransactionStatus) -> Result<Transaction> {
        let mut state = self.state.write();
        let tx = state
            .transactions
            .get_mut(id)
            .ok_or_else(|| PaySentryError::TransactionNotFound {
                transaction_id: id.to_string(),
            })?;

        if tx.status == status {
            return Ok(tx.clone());
        }
        if !tx.status.can_transition_to(status) {
            return Err(PaySentryError::InvalidStatusTransition {
                transaction_id: id.to_string(),
                from: tx.status.to_string(),
                to: status.to_string(),
            });
        }

        tx.mark(status);
        Ok(tx.clone())
    }

    /// All transactions for an agent, newest-first
    pub fn get_by_agent(&self, agent_id: &str) -> Vec<Transaction> {
        let state = self.state.read();
        Self::collect_newest_first(&state, state.by_agent.get(agent_id))
    }

    /// All transactions for a service tag, newest-first
    pub fn get_by_service(&self, service_id: &str) -> Vec<Transaction> {
        let state = self.state.read();
        Self::collect_newest_first(&state, state.by_service.get(service_id))
    }

    /// All transactions to a recipient, newest-first
    pub fn get_by_recipient(&self, recipient: &str) -> Vec<Transaction> {
        let state = self.state.read();
        Self::collect_newest_first(&state, state.by_recipient.get(recipient))
    }

    fn collect_newest_first(state: &LedgerState, ids: Option<&Vec<TransactionId>>) -> Vec<Transaction> {
        match ids {
            Some(ids) => ids
                .iter()
                .rev()
                .filter_map(|id| state.transactions.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Query transactions with AND semantics over every present filter,
    /// newest-first, truncated to `limit`.
    ///
    /// The scan starts from the most selective secondary index among
    /// agent, service and recipient (in that order on ties) and applies
    /// the remaining predicates to the candidates.
    pub fn query(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        let state = self.state.read();

        let mut candidates: Vec<&TransactionId> = match self.pick_index(&state, filter) {
            Some(ids) => ids.iter().collect(),
            None => state.chronological.iter().collect(),
        };

        candidates.sort_by(|a, b| {
            let sa = state.arrival.get(*a).copied().unwrap_or(0);
            let sb = state.arrival.get(*b).copied().unwrap_or(0);
            sb.cmp(&sa)
        });

        let mut out = Vec::new();
        for id in candidates {
            let Some(tx) = state.transactions.get(id) else {
                continue;
            };
            if Self::matches(tx, filter) {
                out.push(tx.clone());
                if let Some(limit) = filter.limit {
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
        out
    }

    fn pick_index<'a>(
        &self,
        state: &'a LedgerState,
        filter: &TransactionFilter,
    ) -> Option<&'a Vec<TransactionId>> {
        static EMPTY: Vec<TransactionId> = Vec::new();

        let mut best: Option<&'a Vec<TransactionId>> = None;
        let mut consider = |ids: Option<&'a Vec<TransactionId>>| {
            let ids = ids.unwrap_or(&EMPTY);
            match best {
                Some(current) if current.len() <= ids.len() => {}
                _ => best = Some(ids),
            }
        };

        if let Some(agent) = &filter.agent_id {
            consider(state.by_agent.get(agent));
        }
        if let Some(service) = &filter.service_id {
            consider(state.by_service.get(service));
        }
        if let Some(recipient) = &filter.recipient {
            consider(state.by_recipient.get(recipient));
        }
        best
    }

    fn matches(tx: &Transaction, filter: &TransactionFilter) -> bool {
        if let Some(agent) = &filter.agent_id {
            if &tx.agent_id != agent {
                return false;
            }
        }
        if let Some(recipient) = &filter.recipient {
            if &tx.recipient != recipient {
                return false;
            }
        }
        if let Some(service) = &filter.service_id {
            if tx.service_id.as_deref() != Some(service.as_str()) {
                return false;
            }
        }
        if let Some(protocol) = filter.protocol {
            if tx.protocol != protocol {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if tx.status != status {
                return false;
            }
        }
        if let Some(currency) = &filter.currency {
            if &tx.currency != currency {
                return false;
            }
        }
        if let Some(min) = filter.min_amount {
            if tx.amount < min {
                return false;
            }
        }
        if let Some(max) = filter.max_amount {
            if tx.amount > max {
                return false;
            }
        }
        if let Some(after) = filter.after {
            if tx.created_at <= after {
                return false;
            }
        }
        if let Some(before) = filter.before {
            if tx.created_at >= before {
                return false;
            }
        }
        true
    }

    /// Number of transactions recorded
    pub fn size(&self) -> usize {
        self.state.read().transactions.len()
    }

    /// All agent ids seen by the ledger
    pub fn agents(&self) -> Vec<String> {
        self.state.read().by_agent.keys().cloned().collect()
    }

    /// All recipients seen by the ledger
    pub fn recipients(&self) -> Vec<String> {
        self.state.read().by_recipient.keys().cloned().collect()
    }

    /// Every transaction, newest-first
    pub fn all(&self) -> Vec<Transaction> {
        let state = self.state.read();
        state
            .chronological
            .iter()
            .rev()
            .filter_map(|id| state.transactions.get(id).cloned())
            .collect()
    }
}
