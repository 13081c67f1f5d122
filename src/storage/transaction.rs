//! A unit of work staged over committed tables.

use crate::audit::AuditRecord;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::tables::{Changes, DecisionRecord, PrincipalRecord, Tables};

/// Reads see committed state overlaid with this unit's own writes. Writes
/// only touch the pending [`Changes`], so staging costs what was written,
/// not what is stored.
pub struct Transaction<'a> {
    base: &'a Tables,
    changes: Changes,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(base: &'a Tables) -> Self {
        Self {
            base,
            changes: Changes::default(),
        }
    }

    pub(crate) fn into_changes(self) -> Changes {
        self.changes
    }

    pub fn principal(&self, id: &str) -> Option<&PrincipalRecord> {
        self.changes
            .principals
            .get(id)
            .or_else(|| self.base.principals.get(id))
    }

    pub fn has_principals(&self) -> bool {
        !self.changes.principals.is_empty() || !self.base.principals.is_empty()
    }

    /// Emails never change after creation, so pending rows cannot shadow a
    /// committed match.
    pub fn principal_by_email(&self, email: &str) -> Option<&PrincipalRecord> {
        self.changes
            .principals
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .or_else(|| self.base.principal_by_email(email))
    }

    /// Insert or replace a principal.
    pub fn put_principal(&mut self, record: PrincipalRecord) {
        self.changes.principals.insert(record.id.clone(), record);
    }

    pub fn decision(&self, id: u64) -> Option<&DecisionRecord> {
        self.changes
            .decisions
            .get(&id)
            .or_else(|| self.base.decisions.get(&id))
    }

    /// Insert or replace a decision.
    pub fn put_decision(&mut self, record: DecisionRecord) {
        self.changes.decisions.insert(record.id, record);
    }

    /// Reserve the next decision id. Consumed only if the unit commits.
    pub fn next_decision_id(&mut self) -> StoreResult<u64> {
        let last = self
            .changes
            .last_decision_id
            .unwrap_or_else(|| self.base.last_decision_id());
        let next = last.checked_add(1).ok_or(StoreError::IdsExhausted("decision"))?;
        self.changes.last_decision_id = Some(next);
        Ok(next)
    }

    pub fn last_audit(&self) -> Option<&AuditRecord> {
        self.changes.audit.last().or_else(|| self.base.last_audit())
    }

    pub fn push_audit(&mut self, record: AuditRecord) {
        self.changes.audit.push(record);
    }
}
