//! Request and response payloads for service operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::VerificationReport;
use crate::config::HashMode;
use crate::ethics::{EthicsStatus, FairnessMetrics, RiskAnalysis};
use crate::storage::PrincipalRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// A principal as shown to callers. Never carries password material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&PrincipalRecord> for UserView {
    fn from(record: &PrincipalRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            role: record.role.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleChange {
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDecision {
    pub owner_id: String,
    #[serde(rename = "decision_label")]
    pub label: String,
    pub score: f64,
    #[serde(default)]
    pub sensitive_attribute: Option<String>,
}

/// A decision with its sensitive attribute decrypted for the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionView {
    pub id: u64,
    pub owner_id: String,
    #[serde(rename = "decision_label")]
    pub label: String,
    pub score: f64,
    pub sensitive_attribute: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLogEntry {
    pub decision_id: u64,
    #[serde(default)]
    pub event_type: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthicsVerdict {
    pub decision_id: u64,
    pub ethics_status: EthicsStatus,
    pub explanation: String,
    pub log_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FairnessRequest {
    pub dataset: String,
    #[serde(flatten)]
    pub metrics: FairnessMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessReport {
    pub dataset: String,
    pub metrics: FairnessMetrics,
    pub risk_analysis: RiskAnalysis,
    pub log_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSummary {
    pub enabled: bool,
    pub max_requests: usize,
    pub window_secs: u64,
    pub tracked_principals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub generated_at: DateTime<Utc>,
    pub principals_by_role: BTreeMap<String, usize>,
    pub decision_count: usize,
    pub audit_record_count: usize,
    pub hash_mode: HashMode,
    pub integrity: VerificationReport,
    pub rate_limit: RateLimitSummary,
}
