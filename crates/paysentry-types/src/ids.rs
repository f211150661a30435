//! Identifier types for PaySentry
//!
//! All generated identifiers share the wire format
//! `<prefix>_<lowercase-hex-millisecond-timestamp>_<8-char-base36-random>`,
//! and each kind of identifier is a strongly typed wrapper to prevent
//! accidental mixing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_LEN: usize = 8;

/// Generate a fresh identifier string for the given prefix.
///
/// The timestamp component makes identifiers sort roughly by creation time;
/// the random suffix makes them unique within the process lifetime.
pub fn generate_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}_{:x}_{}", prefix, millis, suffix)
}

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// The identifier prefix for this type
            pub const PREFIX: &'static str = $prefix;

            /// Create a new random ID
            pub fn new() -> Self {
                Self(generate_id($prefix))
            }

            /// Wrap an existing identifier string
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type!(TransactionId, "ps", "Unique identifier for a payment transaction");
define_id_type!(DisputeId, "dsp", "Unique identifier for a dispute case");
define_id_type!(RecoveryId, "rcv", "Unique identifier for a recovery action");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = TransactionId::new();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ps");
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_id_uniqueness() {
        let a = DisputeId::new();
        let b = DisputeId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_prefixes() {
        assert!(TransactionId::new().as_str().starts_with("ps_"));
        assert!(DisputeId::new().as_str().starts_with("dsp_"));
        assert!(RecoveryId::new().as_str().starts_with("rcv_"));
    }

    #[test]
    fn test_id_round_trip() {
        let id = RecoveryId::new();
        let restored = RecoveryId::from_string(id.as_str());
        assert_eq!(id, restored);
    }
}
