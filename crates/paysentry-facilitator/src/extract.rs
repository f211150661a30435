//! Deriving control-plane transactions from wire payloads
//!
//! The adapter never hands raw protocol payloads to the policy engine; an
//! extractor turns each (payload, requirements) pair into a canonical
//! [`Transaction`] first.

use std::collections::HashMap;

use rust_decimal::Decimal;

use paysentry_types::{PaymentProtocol, Transaction};

use crate::wire::{PaymentPayload, PaymentRequirements};

/// Builds a [`Transaction`] from an x402-style request
pub trait TransactionExtractor: Send + Sync {
    /// Derive the transaction the policy engine will judge
    fn extract(&self, payload: &PaymentPayload, requirements: &PaymentRequirements)
        -> Transaction;
}

/// Default extractor
///
/// Agent comes from the payload's payer field (falling back to a
/// configured agent id), recipient from the requirements' pay-to, and the
/// amount from `max_amount_required` divided by the currency's base-unit
/// decimals.
pub struct DefaultExtractor {
    /// Agent id used when the payload names no payer
    pub fallback_agent: String,
    /// Currency assigned to derived transactions
    pub default_currency: String,
    /// Base-unit decimals per currency; unlisted currencies use 6
    pub decimals: HashMap<String, u32>,
}

impl DefaultExtractor {
    /// Decimals used for currencies with no explicit entry
    pub const DEFAULT_DECIMALS: u32 = 6;

    /// Create an extractor with the standard currency table (USDC=6, ETH=18)
    pub fn new(fallback_agent: impl Into<String>) -> Self {
        let mut decimals = HashMap::new();
        decimals.insert("USDC".to_string(), 6);
        decimals.insert("ETH".to_string(), 18);
        Self {
            fallback_agent: fallback_agent.into(),
            default_currency: "USDC".to_string(),
            decimals,
        }
    }

    /// Override the currency assigned to derived transactions
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Register base-unit decimals for a currency
    pub fn with_decimals(mut self, currency: impl Into<String>, decimals: u32) -> Self {
        self.decimals.insert(currency.into(), decimals);
        self
    }

    fn decimals_for(&self, currency: &str) -> u32 {
        self.decimals
            .get(currency)
            .copied()
            .unwrap_or(Self::DEFAULT_DECIMALS)
    }

    fn amount(&self, requirements: &PaymentRequirements) -> Decimal {
        let units: i128 = requirements.max_amount_required.parse().unwrap_or(0);
        Decimal::from_i128_with_scale(units, self.decimals_for(&self.default_currency))
    }
}

impl Default for DefaultExtractor {
    fn default() -> Self {
        Self::new("unknown-agent")
    }
}

impl TransactionExtractor for DefaultExtractor {
    fn extract(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Transaction {
        let agent = payload
            .payer
            .clone()
            .unwrap_or_else(|| self.fallback_agent.clone());

        let mut metadata = HashMap::new();
        metadata.insert("scheme".to_string(), requirements.scheme.clone());
        metadata.insert("network".to_string(), requirements.network.clone());
        metadata.insert("resource".to_string(), requirements.resource.clone());

        Transaction::new(
            agent,
            requirements.pay_to.clone(),
            self.amount(requirements),
            self.default_currency.clone(),
            requirements.description.clone(),
            PaymentProtocol::X402,
        )
        .with_metadata(metadata)
    }
}

/// De-duplication key for a derived transaction.
///
/// Verify and settle calls carrying the same request resolve to the same
/// internal transaction through this key.
pub fn transaction_key(payload: &PaymentPayload, requirements: &PaymentRequirements) -> String {
    format!(
        "x402:{}:{}:{}",
        payload.payer.as_deref().unwrap_or("unknown"),
        requirements.pay_to,
        requirements.max_amount_required
    )
}
