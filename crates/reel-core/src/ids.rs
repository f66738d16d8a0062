use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque string id `<prefix>_<uuid v7>`, so ids sort by creation time.
macro_rules! correlation_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

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
                f.write_str(&self.0)
            }
        }

    };
}

correlation_id!(SessionId, "sess");
// Correlates a parser resolution with the request that started it.
correlation_id!(RequestId, "req");
// Correlates creative load signals and creative events with one load attempt.
correlation_id!(LoadToken, "load");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_has_prefix() {
        let id = SessionId::new();
        assert!(id.as_str().starts_with("sess_"), "got: {id}");
    }

    #[test]
    fn request_id_has_prefix() {
        let id = RequestId::new();
        assert!(id.as_str().starts_with("req_"), "got: {id}");
    }

    #[test]
    fn load_token_has_prefix() {
        let id = LoadToken::new();
        assert!(id.as_str().starts_with("load_"), "got: {id}");
    }

    #[test]
    fn tokens_are_unique() {
        let a = LoadToken::new();
        let b = LoadToken::new();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = SessionId::from_raw("sess_fixed");
        assert_eq!(serde_json::to_value(&id).unwrap(), "sess_fixed");
        assert_eq!(id.to_string(), "sess_fixed");
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = LoadToken::from_raw("load-fixed");
        assert_eq!(id.as_str(), "load-fixed");
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<RequestId> = (0..50).map(|_| RequestId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0].as_str() < w[1].as_str(), "not monotonic: {} >= {}", w[0], w[1]);
        }
    }
}
