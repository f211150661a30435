//! PaySentry Types - Canonical domain types for the payment control plane
//!
//! This crate contains all foundational types for PaySentry with zero
//! dependencies on other paysentry crates. It defines the complete type
//! system for:
//!
//! - Identifier types (TransactionId, DisputeId, RecoveryId, etc.)
//! - The canonical in-memory transaction record and its lifecycle
//! - Spend policies, rules, budget limits and policy decisions
//! - Provenance stage records
//! - Dispute cases and recovery actions
//! - Alerts and alert severities
//! - The glob matcher used by policy conditions
//!
//! # Architectural Invariants
//!
//! These types support the core PaySentry control invariants:
//!
//! 1. The control plane gates payments, it never settles them
//! 2. Policy decisions are deterministic: same inputs, same decision
//! 3. Budgets count settled funds only
//! 4. Provenance is append-only; records are never removed or reordered

pub mod alert;
pub mod dispute;
pub mod error;
pub mod glob;
pub mod ids;
pub mod policy;
pub mod provenance;
pub mod recovery;
pub mod transaction;

pub use alert::*;
pub use dispute::*;
pub use error::*;
pub use glob::*;
pub use ids::*;
pub use policy::*;
pub use provenance::*;
pub use recovery::*;
pub use transaction::*;

/// Version of the PaySentry types schema
pub const TYPES_VERSION: &str = "0.1.0";
