//! x402-style wire types
//!
//! These mirror the JSON shapes exchanged with external facilitators, so
//! field names are camelCase on the wire. The payment payload's inner
//! `payload` field is protocol-opaque and passed through untouched.

use serde::{Deserialize, Serialize};

/// A payment payload presented by an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version
    pub x402_version: u32,
    /// Payment scheme (e.g. `exact`)
    pub scheme: String,
    /// Network the payment settles on
    pub network: String,
    /// Scheme-specific payload, opaque to the control plane
    pub payload: serde_json::Value,
    /// Resource being paid for
    pub resource: String,
    /// Paying agent, when the scheme exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Payment requirements published by a resource server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme
    pub scheme: String,
    /// Network the payment must settle on
    pub network: String,
    /// Maximum amount, as a stringified integer in base units
    pub max_amount_required: String,
    /// Resource being paid for
    pub resource: String,
    /// Receiving address or handle
    pub pay_to: String,
    /// Human-readable description
    pub description: String,
}

/// Facilitator reply to a verify call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment payload is valid
    pub is_valid: bool,
    /// Payer identity recovered from the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Why the payload was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

impl VerifyResponse {
    /// A rejection with a reason
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            payer: None,
            invalid_reason: Some(reason.into()),
        }
    }
}

/// Facilitator reply to a settle call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement succeeded
    pub success: bool,
    /// Protocol-level transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Network the payment settled on
    pub network: String,
    /// Error detail when not successful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facilitator capability listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    /// Supported payment schemes
    pub schemes: Vec<String>,
    /// Supported networks
    pub networks: Vec<String>,
}
