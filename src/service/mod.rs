//! Monitor service.
//!
//! Composes the security core, the record store and the audit ledger into
//! the operations exposed over HTTP.
//!
//! # Data Flow
//! ```text
//! bearer token
//!     → TokenService::validate          (expired / forged)
//!     → live role from the Credential Store (unknown principal = forged)
//!     → authorize(live role, allowed set)
//!     → RateLimiter::check_and_record
//!     → business write + audit entry in one Store unit of work
//!     → AuditLedger::committed
//! ```
//!
//! # Design Decisions
//! - One explicitly constructed `MonitorService` per process; no globals
//! - Operations are synchronous. Password hashing and durable commits block,
//!   so async callers run them on the blocking pool
//! - Free text is sanitized before it reaches the store or the ledger

pub mod error;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use crate::audit::{event_types, AuditFilter, AuditLedger, AuditRecord, NewAuditEntry, VerificationReport};
use crate::config::schema::RateLimitConfig;
use crate::config::MonitorConfig;
use crate::ethics::{self, fairness, verdict, RiskTier};
use crate::observability::metrics;
use crate::security::password::{burn_verification, hash_password, verify_password};
use crate::security::sanitize::{hash_sensitive, sanitize_input};
use crate::security::{
    authorize, policy, roles, Clock, FieldCipher, RateLimiter, SecurityError, SystemClock, TokenClaims,
    TokenService, WindowStore,
};
use crate::storage::{DecisionRecord, JsonLinesBackend, PrincipalRecord, Store, Transaction};

pub use error::{ServiceError, ServiceResult};
pub use types::{
    AuditQuery, DecisionView, EthicsVerdict, FairnessReport, FairnessRequest, LoginRequest, LoginResponse,
    NewDecision, NewLogEntry, NewUser, RateLimitSummary, RoleChange, SecurityReport, UserView,
};

pub const DEFAULT_AUDIT_LIMIT: usize = 50;
pub const MAX_AUDIT_LIMIT: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 8;

pub struct MonitorService {
    store: Store,
    tokens: TokenService,
    token_ttl: Duration,
    limiter: RateLimiter,
    rate_limit: RateLimitConfig,
    cipher: FieldCipher,
    ledger: AuditLedger,
    clock: Arc<dyn Clock>,
}

impl MonitorService {
    /// Build the service from validated configuration, opening the configured
    /// store and using wall-clock time.
    pub fn from_config(config: &MonitorConfig) -> ServiceResult<Self> {
        let store = match &config.storage.path {
            Some(path) => {
                tracing::info!(path = %path, "Opening file-backed store");
                Store::open(JsonLinesBackend::new(path))?
            }
            None => {
                tracing::warn!("No storage path configured, records are kept in memory only");
                Store::in_memory()
            }
        };
        Self::new(config, store, Arc::new(SystemClock))
    }

    pub fn new(config: &MonitorConfig, store: Store, clock: Arc<dyn Clock>) -> ServiceResult<Self> {
        let cipher = FieldCipher::from_base64_key(
            &config.encryption.key,
            config.encryption.allow_plaintext_fallback,
        )?;
        if config.encryption.allow_plaintext_fallback {
            tracing::warn!(
                target: "audit",
                "Plaintext fallback is enabled for sensitive fields; encryption failures will store plaintext"
            );
        }

        let ttl_secs = i64::try_from(config.auth.token_ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);

        Ok(Self {
            store,
            tokens: TokenService::new(config.auth.jwt_secret.as_bytes(), clock.clone()),
            token_ttl: Duration::seconds(ttl_secs),
            limiter: RateLimiter::new(clock.clone()),
            rate_limit: config.rate_limit.clone(),
            cipher,
            ledger: AuditLedger::new(config.audit.hash_mode, clock.clone()),
            clock,
        })
    }

    /// Swap the in-process sliding windows for a shared store.
    pub fn with_window_store(mut self, windows: Arc<dyn WindowStore>) -> Self {
        self.limiter = RateLimiter::with_store(windows, self.clock.clone());
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validate `token`, refresh its role from the Credential Store, check it
    /// against `allowed_roles` and count the call against the principal's
    /// rate window.
    pub fn admit(&self, token: &str, allowed_roles: &[&str]) -> ServiceResult<TokenClaims> {
        let mut claims = self.tokens.validate(token).inspect_err(|e| {
            metrics::record_auth_failure(match e {
                SecurityError::ExpiredToken => "expired",
                _ => "malformed",
            });
        })?;

        let live_role = self
            .store
            .read(|t| t.principals.get(&claims.principal_id).map(|p| p.role.clone()));
        let Some(role) = live_role else {
            metrics::record_auth_failure("unknown_principal");
            tracing::warn!(
                target: "audit",
                event = "unknown_principal",
                principal = %claims.principal_id,
                "Validly signed token names no known principal"
            );
            return Err(SecurityError::MalformedOrForgedToken.into());
        };
        if role != claims.role {
            tracing::debug!(
                principal = %claims.principal_id,
                token_role = %claims.role,
                live_role = %role,
                "Role changed since token issuance"
            );
            claims.role = role;
        }

        authorize(&claims, allowed_roles).inspect_err(|_| metrics::record_auth_failure("forbidden"))?;
        self.enforce_rate_limit(&claims.principal_id)?;
        Ok(claims)
    }

    fn enforce_rate_limit(&self, principal_id: &str) -> ServiceResult<()> {
        if !self.rate_limit.enabled {
            return Ok(());
        }
        let Err(rejection) = self.limiter.check_and_record(
            principal_id,
            self.rate_limit.max_requests,
            self.rate_limit.window_secs,
        ) else {
            return Ok(());
        };

        // Written straight to the ledger; it never passes through the limiter.
        if self.rate_limit.audit_rejections {
            let entry = NewAuditEntry::new(
                event_types::RATE_LIMIT,
                format!(
                    "Rate limit exceeded: more than {} requests in {}s",
                    self.rate_limit.max_requests, self.rate_limit.window_secs
                ),
            )
            .actor(principal_id);
            if let Err(e) = self.ledger.append(&self.store, entry) {
                tracing::error!(error = %e, principal = %principal_id, "Failed to audit rate-limit rejection");
            }
        }
        Err(rejection.into())
    }

    fn unit_of_work<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> ServiceResult<T>) -> ServiceResult<T> {
        self.store.transact(f)
    }

    /// Append a `SYSTEM` entry with no actor.
    pub fn record_system_event(&self, message: &str) -> ServiceResult<AuditRecord> {
        let entry = NewAuditEntry::new(event_types::SYSTEM, sanitize_input(message));
        Ok(self.ledger.append(&self.store, entry)?)
    }

    // Credential Store

    /// Create a principal. Unauthenticated callers may register any role
    /// except `admin`; the first principal in an empty store may be `admin`.
    pub fn register_user(&self, token: Option<&str>, new: NewUser) -> ServiceResult<UserView> {
        let username = bounded("username", &new.username, 3, 50)?;
        if username != new.username.trim() || username.chars().any(char::is_whitespace) {
            return Err(ServiceError::Validation(
                "username contains invalid characters".to_string(),
            ));
        }
        let email = new.email.trim().to_string();
        validate_email(&email)?;
        if new.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let role = bounded("role", new.role.as_deref().unwrap_or(roles::ANALYST), 3, 50)?;

        let requester = token.map(|t| self.admit(t, policy::READERS)).transpose()?;
        let password_hash = hash_password(&new.password)?;
        let now = self.clock.now();

        let (user, audit) = self.unit_of_work(|tx| {
            let requester_is_admin = requester.as_ref().is_some_and(|c| c.role == roles::ADMIN);
            if role == roles::ADMIN && tx.has_principals() && !requester_is_admin {
                return Err(SecurityError::Forbidden.into());
            }
            if tx.principal(&username).is_some() || tx.principal_by_email(&email).is_some() {
                return Err(ServiceError::Conflict(
                    "username or email already exists".to_string(),
                ));
            }

            let record = PrincipalRecord {
                id: username.clone(),
                email: email.clone(),
                password_hash,
                role: role.clone(),
                created_at: now,
            };
            let view = UserView::from(&record);
            tx.put_principal(record);

            let mut entry = NewAuditEntry::new(
                event_types::USER_CREATED,
                format!("Principal {username} created with role {role}"),
            );
            if let Some(c) = &requester {
                entry = entry.actor(c.principal_id.clone());
            }
            Ok((view, self.ledger.append_in(tx, entry)?))
        })?;

        self.ledger.committed(&audit);
        tracing::info!(principal = %user.id, role = %user.role, "Principal registered");
        Ok(user)
    }

    /// Admins may read any principal; everyone else only themselves.
    pub fn get_user(&self, token: &str, id: &str) -> ServiceResult<UserView> {
        let caller = self.admit(token, policy::READERS)?;
        if caller.role != roles::ADMIN && caller.principal_id != id {
            return Err(SecurityError::Forbidden.into());
        }
        self.store
            .read(|t| t.principals.get(id).map(UserView::from))
            .ok_or(ServiceError::NotFound("user"))
    }

    /// Exchange credentials for a session token. Unknown username and wrong
    /// password fail identically.
    pub fn login(&self, request: &LoginRequest) -> ServiceResult<LoginResponse> {
        let username = request.username.trim();
        let principal = self.store.read(|t| t.principals.get(username).cloned());

        let verified = match &principal {
            Some(p) => verify_password(&request.password, &p.password_hash),
            None => {
                burn_verification(&request.password);
                false
            }
        };

        let Some(principal) = principal.filter(|_| verified) else {
            metrics::record_auth_failure("bad_credentials");
            let reference = hash_sensitive(username);
            let entry = NewAuditEntry::new(
                event_types::LOGIN_FAILED,
                format!("Failed login for principal ref {}", &reference[..16]),
            );
            self.ledger.append(&self.store, entry)?;
            return Err(SecurityError::InvalidCredentials.into());
        };

        let issued = self.tokens.issue(&principal.id, &principal.role, self.token_ttl)?;
        self.ledger.append(
            &self.store,
            NewAuditEntry::new(event_types::LOGIN, "Login succeeded").actor(principal.id.clone()),
        )?;

        let expires_in = issued.expires_in();
        Ok(LoginResponse {
            access_token: issued.token,
            token_type: "bearer".to_string(),
            expires_in,
        })
    }

    pub fn change_role(&self, token: &str, target: &str, change: RoleChange) -> ServiceResult<UserView> {
        let caller = self.admit(token, policy::ADMIN_ONLY)?;
        let role = bounded("role", &change.role, 3, 50)?;

        let (user, audit) = self.unit_of_work(|tx| {
            let mut record = tx.principal(target).cloned().ok_or(ServiceError::NotFound("user"))?;
            let previous = std::mem::replace(&mut record.role, role.clone());
            let view = UserView::from(&record);
            tx.put_principal(record);

            let entry = NewAuditEntry::new(
                event_types::ROLE_CHANGED,
                format!("Role of {target} changed from {previous} to {role}"),
            )
            .actor(caller.principal_id.clone());
            Ok((view, self.ledger.append_in(tx, entry)?))
        })?;

        self.ledger.committed(&audit);
        Ok(user)
    }

    // Decisions

    pub fn create_decision(&self, token: &str, new: NewDecision) -> ServiceResult<DecisionView> {
        let caller = self.admit(token, policy::DECISION_WRITERS)?;
        let label = bounded("decision_label", &new.label, 2, 50)?;
        if !(0.0..=1.0).contains(&new.score) {
            return Err(ServiceError::Validation(
                "score must be between 0 and 1".to_string(),
            ));
        }
        let sensitive = new
            .sensitive_attribute
            .as_deref()
            .map(sanitize_input)
            .filter(|s| !s.is_empty())
            .map(|s| bounded("sensitive_attribute", &s, 1, 50))
            .transpose()?;

        let envelope = self.cipher.encrypt(sensitive.as_deref())?;
        let now = self.clock.now();

        let (record, audit) = self.unit_of_work(|tx| {
            if tx.principal(&new.owner_id).is_none() {
                return Err(ServiceError::Validation("owner does not exist".to_string()));
            }
            let id = tx.next_decision_id()?;
            let record = DecisionRecord {
                id,
                owner_id: new.owner_id.clone(),
                label: label.clone(),
                score: new.score,
                sensitive_attribute: envelope,
                created_at: now,
            };
            tx.put_decision(record.clone());

            let entry = NewAuditEntry::new(
                event_types::DECISION_CREATED,
                format!("Decision {id} recorded: {label} (score {:.3})", new.score),
            )
            .actor(caller.principal_id.clone())
            .subject(id);
            Ok((record, self.ledger.append_in(tx, entry)?))
        })?;

        self.ledger.committed(&audit);
        Ok(DecisionView {
            id: record.id,
            owner_id: record.owner_id,
            label: record.label,
            score: record.score,
            sensitive_attribute: sensitive,
            created_at: record.created_at,
        })
    }

    pub fn get_decision(&self, token: &str, id: u64) -> ServiceResult<DecisionView> {
        self.admit(token, policy::READERS)?;
        let record = self
            .store
            .read(|t| t.decisions.get(&id).cloned())
            .ok_or(ServiceError::NotFound("decision"))?;

        Ok(DecisionView {
            id: record.id,
            sensitive_attribute: self.cipher.decrypt(record.sensitive_attribute.as_deref()),
            owner_id: record.owner_id,
            label: record.label,
            score: record.score,
            created_at: record.created_at,
        })
    }

    /// Free-form audit entry against an existing decision.
    pub fn append_log(&self, token: &str, entry: NewLogEntry) -> ServiceResult<AuditRecord> {
        let caller = self.admit(token, policy::ADMIN_ONLY)?;
        let message = bounded("message", &entry.message, 5, 5000)?;
        let event_type = match entry.event_type.as_deref().map(sanitize_input) {
            Some(t) if t.is_empty() => event_types::SYSTEM.to_string(),
            Some(t) if t.chars().count() > 50 => {
                return Err(ServiceError::Validation(
                    "event_type must be at most 50 characters".to_string(),
                ))
            }
            Some(t) => t,
            None => event_types::SYSTEM.to_string(),
        };

        let audit = self.unit_of_work(|tx| {
            if tx.decision(entry.decision_id).is_none() {
                return Err(ServiceError::Validation("decision does not exist".to_string()));
            }
            let new_entry = NewAuditEntry::new(event_type, message)
                .actor(caller.principal_id.clone())
                .subject(entry.decision_id);
            Ok(self.ledger.append_in(tx, new_entry)?)
        })?;

        self.ledger.committed(&audit);
        Ok(audit)
    }

    // Ethics

    pub fn evaluate_ethics(&self, token: &str, decision_id: u64) -> ServiceResult<EthicsVerdict> {
        let caller = self.admit(token, policy::ETHICS_EVALUATORS)?;

        let (status, explanation, audit) = self.unit_of_work(|tx| {
            let (score, has_sensitive) = tx
                .decision(decision_id)
                .map(|d| (d.score, d.sensitive_attribute.is_some()))
                .ok_or(ServiceError::NotFound("decision"))?;
            let (status, explanation) = verdict::evaluate(score, has_sensitive);

            let entry = NewAuditEntry::new(
                event_types::ETHICS_EVALUATION,
                format!("ETHICS RESULT: {} | {explanation}", status.as_str()),
            )
            .actor(caller.principal_id.clone())
            .subject(decision_id);
            Ok((status, explanation, self.ledger.append_in(tx, entry)?))
        })?;

        self.ledger.committed(&audit);
        Ok(EthicsVerdict {
            decision_id,
            ethics_status: status,
            explanation: explanation.to_string(),
            log_hash: audit.integrity_hash,
        })
    }

    /// Classify externally computed fairness metrics. A `HIGH` overall tier
    /// also appends a `WARNING` in the same unit of work.
    pub fn assess_fairness(&self, token: &str, request: FairnessRequest) -> ServiceResult<FairnessReport> {
        let caller = self.admit(token, policy::ETHICS_EVALUATORS)?;
        let dataset = bounded("dataset", &request.dataset, 1, 100)?;
        if !request.metrics.is_finite() {
            return Err(ServiceError::Validation(
                "fairness metrics must be finite numbers".to_string(),
            ));
        }
        let assessment = ethics::assess(request.metrics);

        let (evaluation, warning) = self.unit_of_work(|tx| {
            let entry = NewAuditEntry::new(
                event_types::ETHICS_EVALUATION,
                fairness::summarize(&dataset, &assessment),
            )
            .actor(caller.principal_id.clone());
            let evaluation = self.ledger.append_in(tx, entry)?;

            let warning = if assessment.risk_analysis.overall_risk == RiskTier::High {
                let entry = NewAuditEntry::new(
                    event_types::WARNING,
                    format!("High fairness risk detected for dataset {dataset}"),
                )
                .actor(caller.principal_id.clone());
                Some(self.ledger.append_in(tx, entry)?)
            } else {
                None
            };
            Ok((evaluation, warning))
        })?;

        self.ledger.committed(&evaluation);
        if let Some(w) = &warning {
            self.ledger.committed(w);
        }

        Ok(FairnessReport {
            dataset,
            metrics: assessment.metrics,
            risk_analysis: assessment.risk_analysis,
            log_hash: evaluation.integrity_hash,
        })
    }

    // Audit surface

    /// Most recent records first.
    pub fn query_audit(&self, token: &str, query: &AuditQuery) -> ServiceResult<Vec<AuditRecord>> {
        self.admit(token, policy::ADMIN_ONLY)?;
        let limit = match query.limit {
            None => DEFAULT_AUDIT_LIMIT,
            Some(0) => {
                return Err(ServiceError::Validation("limit must be at least 1".to_string()));
            }
            Some(n) => n.min(MAX_AUDIT_LIMIT),
        };
        let filter = AuditFilter {
            event_type: query.event_type.clone().filter(|t| !t.trim().is_empty()),
            ..AuditFilter::default()
        };
        Ok(self.ledger.query(&self.store, &filter, limit))
    }

    pub fn verify_audit(&self, token: &str) -> ServiceResult<VerificationReport> {
        self.admit(token, policy::ADMIN_ONLY)?;
        Ok(self.integrity_check())
    }

    /// Ledger verification without a caller, for local operator tooling.
    pub fn integrity_check(&self) -> VerificationReport {
        self.ledger.verify(&self.store)
    }

    pub fn security_report(&self, token: &str) -> ServiceResult<SecurityReport> {
        self.admit(token, policy::ADMIN_ONLY)?;

        let (principals_by_role, decision_count, audit_record_count) = self.store.read(|t| {
            let mut by_role = BTreeMap::new();
            for principal in t.principals.values() {
                *by_role.entry(principal.role.clone()).or_insert(0usize) += 1;
            }
            (by_role, t.decisions.len(), t.audit.len())
        });

        Ok(SecurityReport {
            generated_at: self.clock.now(),
            principals_by_role,
            decision_count,
            audit_record_count,
            hash_mode: self.ledger.mode(),
            integrity: self.integrity_check(),
            rate_limit: RateLimitSummary {
                enabled: self.rate_limit.enabled,
                max_requests: self.rate_limit.max_requests,
                window_secs: self.rate_limit.window_secs,
                tracked_principals: self.limiter.tracked_principals(self.rate_limit.window_secs),
            },
        })
    }
}

/// Sanitize `value` and check its length in characters.
fn bounded(field: &str, value: &str, min: usize, max: usize) -> ServiceResult<String> {
    let cleaned = sanitize_input(value);
    let len = cleaned.chars().count();
    if len < min || len > max {
        return Err(ServiceError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(cleaned)
}

fn validate_email(email: &str) -> ServiceResult<()> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && email.len() <= 254 =>
        {
            Ok(())
        }
        _ => Err(ServiceError::Validation("email address is invalid".to_string())),
    }
}
