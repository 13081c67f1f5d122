//! Audit records and their integrity digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Event types produced by this service. The ledger accepts any string.
pub mod event_types {
    pub const SYSTEM: &str = "SYSTEM";
    pub const WARNING: &str = "WARNING";
    pub const DEMO_DATA: &str = "DEMO_DATA";
    pub const ETHICS_EVALUATION: &str = "ETHICS_EVALUATION";
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const USER_CREATED: &str = "USER_CREATED";
    pub const ROLE_CHANGED: &str = "ROLE_CHANGED";
    pub const LOGIN: &str = "LOGIN";
    pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
    pub const DECISION_CREATED: &str = "DECISION_CREATED";
}

/// `previous_hash` of the first record in a chained ledger.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub event_type: String,
    pub actor_id: Option<String>,
    pub subject_id: Option<u64>,
    pub message: String,
}

impl NewAuditEntry {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            actor_id: None,
            subject_id: None,
            message: message.into(),
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn subject(mut self, subject_id: u64) -> Self {
        self.subject_id = Some(subject_id);
        self
    }
}

/// A stored, immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 1-based, gap-free sequence id.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// `None` for system events.
    pub actor_id: Option<String>,
    /// Decision the event concerns, if any.
    pub subject_id: Option<u64>,
    pub message: String,
    /// Set only for records written in chained mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    /// SHA-256 hex over the fields above (see [`integrity_digest`]).
    pub integrity_hash: String,
}

impl AuditRecord {
    /// Recompute the digest from the stored fields.
    pub fn recompute_hash(&self) -> String {
        integrity_digest(
            self.previous_hash.as_deref(),
            &self.event_type,
            self.actor_id.as_deref(),
            &self.message,
            self.subject_id,
        )
    }

    /// True if the stored hash matches the stored fields.
    pub fn verify(&self) -> bool {
        self.recompute_hash() == self.integrity_hash
    }
}

/// SHA-256 over `[previous_hash ‖] event_type ‖ actor_id ‖ message ‖ subject_id`.
///
/// Each field is length-prefixed (`<len>:<bytes>;`) and absent values are
/// written as `~;`, so no two distinct field tuples share an encoding.
pub fn integrity_digest(
    previous_hash: Option<&str>,
    event_type: &str,
    actor_id: Option<&str>,
    message: &str,
    subject_id: Option<u64>,
) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = previous_hash {
        hasher.update(b"chain;");
        update_field(&mut hasher, Some(prev));
    }
    update_field(&mut hasher, Some(event_type));
    update_field(&mut hasher, actor_id);
    update_field(&mut hasher, Some(message));
    update_field(&mut hasher, subject_id.map(|id| id.to_string()).as_deref());
    format!("{:x}", hasher.finalize())
}

fn update_field(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(v.len().to_string().as_bytes());
            hasher.update(b":");
            hasher.update(v.as_bytes());
            hasher.update(b";");
        }
        None => hasher.update(b"~;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuditRecord {
        let integrity_hash = integrity_digest(None, "SYSTEM", Some("admin"), "started", Some(4));
        AuditRecord {
            id: 1,
            timestamp: Utc::now(),
            event_type: "SYSTEM".to_string(),
            actor_id: Some("admin".to_string()),
            subject_id: Some(4),
            message: "started".to_string(),
            previous_hash: None,
            integrity_hash,
        }
    }

    #[test]
    fn test_digest_is_deterministic_hex() {
        let a = integrity_digest(None, "SYSTEM", None, "boot", None);
        let b = integrity_digest(None, "SYSTEM", None, "boot", None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_stored_record_verifies() {
        assert!(record().verify());
    }

    #[test]
    fn test_any_field_mutation_is_detected() {
        let mutations: Vec<Box<dyn Fn(&mut AuditRecord)>> = vec![
            Box::new(|r| r.event_type = "WARNING".to_string()),
            Box::new(|r| r.actor_id = Some("mallory".to_string())),
            Box::new(|r| r.actor_id = None),
            Box::new(|r| r.subject_id = Some(5)),
            Box::new(|r| r.subject_id = None),
            Box::new(|r| r.message.push('!')),
            Box::new(|r| r.previous_hash = Some(GENESIS_HASH.to_string())),
        ];
        for mutate in mutations {
            let mut r = record();
            mutate(&mut r);
            assert!(!r.verify(), "mutation went undetected: {r:?}");
        }
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = integrity_digest(None, "AB", Some("C"), "m", None);
        let b = integrity_digest(None, "A", Some("BC"), "m", None);
        assert_ne!(a, b);

        let none_actor = integrity_digest(None, "E", None, "m", None);
        let tilde_actor = integrity_digest(None, "E", Some("~"), "m", None);
        assert_ne!(none_actor, tilde_actor);
    }

    #[test]
    fn test_builder() {
        let entry = NewAuditEntry::new(event_types::SYSTEM, "hello").actor("root").subject(9);
        assert_eq!(entry.actor_id.as_deref(), Some("root"));
        assert_eq!(entry.subject_id, Some(9));
    }
}
