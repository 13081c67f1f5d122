//! Persisted record types and the table set they live in.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;

/// A principal in the credential store. Keyed by its immutable username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// A recorded model decision. The sensitive attribute is stored sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: u64,
    pub owner_id: String,
    pub label: String,
    pub score: f64,
    pub sensitive_attribute: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Every table the store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub principals: BTreeMap<String, PrincipalRecord>,
    pub decisions: BTreeMap<u64, DecisionRecord>,
    /// Append-only, ordered by sequence id.
    pub audit: Vec<AuditRecord>,
    #[serde(default)]
    last_decision_id: u64,
}

impl Tables {
    pub fn last_decision_id(&self) -> u64 {
        self.last_decision_id
    }

    pub fn principal_by_email(&self, email: &str) -> Option<&PrincipalRecord> {
        self.principals
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
    }

    pub fn last_audit(&self) -> Option<&AuditRecord> {
        self.audit.last()
    }

    /// Fold one committed unit of work into the tables.
    pub fn apply(&mut self, changes: Changes) {
        self.principals.extend(changes.principals);
        self.decisions.extend(changes.decisions);
        self.audit.extend(changes.audit);
        if let Some(id) = changes.last_decision_id {
            self.last_decision_id = self.last_decision_id.max(id);
        }
    }
}

/// The writes of one unit of work: upserted rows, appended audit records
/// and the decision id high-water mark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Changes {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub principals: BTreeMap<String, PrincipalRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub decisions: BTreeMap<u64, DecisionRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit: Vec<AuditRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decision_id: Option<u64>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
            && self.decisions.is_empty()
            && self.audit.is_empty()
            && self.last_decision_id.is_none()
    }
}
