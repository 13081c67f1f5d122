//! Append-only audit ledger over the record store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audit::record::{integrity_digest, AuditRecord, NewAuditEntry, GENESIS_HASH};
use crate::config::schema::HashMode;
use crate::observability::metrics;
use crate::security::clock::Clock;
use crate::storage::{Store, StoreError, StoreResult, Transaction};

/// Retrieval filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub event_type: Option<String>,
    pub actor_id: Option<String>,
    pub subject_id: Option<u64>,
}

impl AuditFilter {
    pub fn event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::default()
        }
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        self.event_type.as_ref().map_or(true, |t| *t == record.event_type)
            && self
                .actor_id
                .as_ref()
                .map_or(true, |a| record.actor_id.as_ref() == Some(a))
            && self.subject_id.map_or(true, |s| record.subject_id == Some(s))
    }
}

/// An inclusive run of sequence ids absent from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGap {
    pub first: u64,
    pub last: u64,
}

impl SequenceGap {
    pub fn count(&self) -> u64 {
        self.last - self.first + 1
    }
}

/// Result of recomputing the ledger's integrity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub total_records: usize,
    /// Records whose stored hash does not match their fields.
    pub hash_mismatches: Vec<u64>,
    /// Chained records whose `previous_hash` does not match their predecessor.
    pub chain_breaks: Vec<u64>,
    /// Runs of sequence ids absent from an otherwise contiguous ledger.
    pub missing_sequences: Vec<SequenceGap>,
    /// Total ids across `missing_sequences`.
    pub missing_count: u64,
    /// Out-of-order or duplicated sequence ids.
    pub out_of_order: Vec<u64>,
    pub first_broken: Option<u64>,
    /// Hash of the newest record, for anchoring outside the store.
    pub head_hash: Option<String>,
}

impl VerificationReport {
    pub fn is_intact(&self) -> bool {
        self.hash_mismatches.is_empty()
            && self.chain_breaks.is_empty()
            && self.missing_sequences.is_empty()
            && self.out_of_order.is_empty()
    }
}

/// Produces hashed audit records and reads them back.
#[derive(Clone)]
pub struct AuditLedger {
    mode: HashMode,
    clock: Arc<dyn Clock>,
}

impl AuditLedger {
    pub fn new(mode: HashMode, clock: Arc<dyn Clock>) -> Self {
        if mode == HashMode::Chained {
            tracing::info!("Audit ledger hashes are chained to their predecessor");
        }
        Self { mode, clock }
    }

    pub fn mode(&self) -> HashMode {
        self.mode
    }

    /// Append inside an open unit of work; durable only when that unit
    /// commits. Call [`AuditLedger::committed`] afterwards.
    pub fn append_in(&self, tx: &mut Transaction<'_>, entry: NewAuditEntry) -> StoreResult<AuditRecord> {
        let last = tx.last_audit();
        let id = match last {
            None => 1,
            Some(r) => r.id.checked_add(1).ok_or(StoreError::IdsExhausted("audit"))?,
        };
        let previous_hash = match self.mode {
            HashMode::PerRecord => None,
            HashMode::Chained => Some(
                last.map_or_else(|| GENESIS_HASH.to_string(), |r| r.integrity_hash.clone()),
            ),
        };

        let integrity_hash = integrity_digest(
            previous_hash.as_deref(),
            &entry.event_type,
            entry.actor_id.as_deref(),
            &entry.message,
            entry.subject_id,
        );

        let record = AuditRecord {
            id,
            timestamp: self.clock.now(),
            event_type: entry.event_type,
            actor_id: entry.actor_id,
            subject_id: entry.subject_id,
            message: entry.message,
            previous_hash,
            integrity_hash,
        };
        tx.push_audit(record.clone());
        Ok(record)
    }

    /// Standalone durable append.
    pub fn append(&self, store: &Store, entry: NewAuditEntry) -> StoreResult<AuditRecord> {
        let record = store.transact(|tx| self.append_in(tx, entry))?;
        self.committed(&record);
        Ok(record)
    }

    /// Note a record whose unit of work has committed.
    pub fn committed(&self, record: &AuditRecord) {
        metrics::record_audit_append(&record.event_type);
        tracing::info!(
            target: "audit",
            id = record.id,
            event_type = %record.event_type,
            actor = record.actor_id.as_deref().unwrap_or("system"),
            subject = ?record.subject_id,
            hash = %record.integrity_hash,
            "Audit record appended"
        );
    }

    /// Matching records, most recent first.
    pub fn query(&self, store: &Store, filter: &AuditFilter, limit: usize) -> Vec<AuditRecord> {
        store.read(|tables| {
            tables
                .audit
                .iter()
                .rev()
                .filter(|r| filter.matches(r))
                .take(limit)
                .cloned()
                .collect()
        })
    }

    pub fn verify(&self, store: &Store) -> VerificationReport {
        store.read(|tables| verify_records(&tables.audit))
    }
}

/// Check hashes, linkage and sequence continuity of `records` in stored order.
pub fn verify_records(records: &[AuditRecord]) -> VerificationReport {
    let mut report = VerificationReport {
        total_records: records.len(),
        head_hash: records.last().map(|r| r.integrity_hash.clone()),
        ..VerificationReport::default()
    };

    // None once an id of u64::MAX has been seen: nothing may follow it.
    let mut expected_id = Some(1u64);
    let mut predecessor: Option<&AuditRecord> = None;

    for record in records {
        if !record.verify() {
            report.hash_mismatches.push(record.id);
        }

        match expected_id {
            Some(expected) if record.id > expected => {
                let gap = SequenceGap {
                    first: expected,
                    last: record.id - 1,
                };
                report.missing_count = report.missing_count.saturating_add(gap.count());
                report.missing_sequences.push(gap);
            }
            Some(expected) if record.id == expected => {}
            _ => report.out_of_order.push(record.id),
        }
        expected_id = expected_id.and_then(|expected| record.id.checked_add(1).map(|next| next.max(expected)));

        if let Some(prev) = &record.previous_hash {
            let expected_prev = predecessor.map_or(GENESIS_HASH, |p| p.integrity_hash.as_str());
            if prev != expected_prev {
                report.chain_breaks.push(record.id);
            }
        }
        predecessor = Some(record);
    }

    report.first_broken = [
        report.hash_mismatches.first(),
        report.chain_breaks.first(),
        report.missing_sequences.first().map(|gap| &gap.first),
        report.out_of_order.first(),
    ]
    .into_iter()
    .flatten()
    .min()
    .copied();

    if !report.is_intact() {
        tracing::warn!(
            target: "audit",
            event = "ledger_integrity_failure",
            first_broken = ?report.first_broken,
            "Audit ledger failed verification"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::event_types;
    use crate::security::clock::SystemClock;

    fn ledger(mode: HashMode) -> (AuditLedger, Store) {
        (AuditLedger::new(mode, Arc::new(SystemClock)), Store::in_memory())
    }

    fn fill(ledger: &AuditLedger, store: &Store, n: usize) {
        for i in 0..n {
            let entry = NewAuditEntry::new(event_types::SYSTEM, format!("event {i}")).actor("admin");
            ledger.append(store, entry).unwrap();
        }
    }

    #[test]
    fn test_append_assigns_sequence_and_hash() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        let first = ledger.append(&store, NewAuditEntry::new("SYSTEM", "boot")).unwrap();
        let second = ledger
            .append(&store, NewAuditEntry::new("ETHICS_EVALUATION", "ok").actor("a1").subject(3))
            .unwrap();

        assert_eq!((first.id, second.id), (1, 2));
        assert!(first.previous_hash.is_none());
        assert!(first.verify() && second.verify());
        assert_eq!(second.integrity_hash, integrity_digest(None, "ETHICS_EVALUATION", Some("a1"), "ok", Some(3)));
    }

    #[test]
    fn test_query_is_newest_first_and_filtered() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        ledger.append(&store, NewAuditEntry::new("SYSTEM", "one")).unwrap();
        ledger.append(&store, NewAuditEntry::new("WARNING", "two")).unwrap();
        ledger.append(&store, NewAuditEntry::new("SYSTEM", "three")).unwrap();

        let all = ledger.query(&store, &AuditFilter::default(), 10);
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2, 1]);

        let system = ledger.query(&store, &AuditFilter::event_type("SYSTEM"), 10);
        assert_eq!(system.iter().map(|r| r.message.as_str()).collect::<Vec<_>>(), vec!["three", "one"]);

        assert_eq!(ledger.query(&store, &AuditFilter::default(), 1).len(), 1);
        assert!(ledger.query(&store, &AuditFilter::event_type("free-form"), 10).is_empty());
    }

    #[test]
    fn test_per_record_mode_detects_field_tampering() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        fill(&ledger, &store, 3);
        assert!(ledger.verify(&store).is_intact());

        let mut records = store.read(|t| t.audit.clone());
        records[1].message = "rewritten".to_string();
        let report = verify_records(&records);
        assert_eq!(report.hash_mismatches, vec![2]);
        assert_eq!(report.first_broken, Some(2));
    }

    #[test]
    fn test_per_record_mode_sees_gaps_but_not_tail_deletion() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        fill(&ledger, &store, 4);
        let mut records = store.read(|t| t.audit.clone());

        records.remove(1);
        let report = verify_records(&records);
        assert_eq!(report.missing_sequences, vec![SequenceGap { first: 2, last: 2 }]);
        assert_eq!(report.missing_count, 1);

        let mut truncated = store.read(|t| t.audit.clone());
        truncated.pop();
        assert!(verify_records(&truncated).is_intact());
    }

    #[test]
    fn test_chained_mode_links_records() {
        let (ledger, store) = ledger(HashMode::Chained);
        fill(&ledger, &store, 3);
        let records = store.read(|t| t.audit.clone());

        assert_eq!(records[0].previous_hash.as_deref(), Some(GENESIS_HASH));
        assert_eq!(records[1].previous_hash.as_ref(), Some(&records[0].integrity_hash));
        assert_eq!(records[2].previous_hash.as_ref(), Some(&records[1].integrity_hash));
        assert!(verify_records(&records).is_intact());
    }

    #[test]
    fn test_chained_mode_detects_reordering() {
        let (ledger, store) = ledger(HashMode::Chained);
        fill(&ledger, &store, 3);
        let mut records = store.read(|t| t.audit.clone());
        records.swap(1, 2);

        let report = verify_records(&records);
        assert!(!report.is_intact());
        assert!(!report.chain_breaks.is_empty());
        assert_eq!(report.out_of_order, vec![2]);
    }

    #[test]
    fn test_chained_mode_detects_rehashed_forgery() {
        let (ledger, store) = ledger(HashMode::Chained);
        fill(&ledger, &store, 3);
        let mut records = store.read(|t| t.audit.clone());

        // Rewrite record 2 and fix up its own hash; record 3 still points at the old one.
        records[1].message = "forged".to_string();
        records[1].integrity_hash = records[1].recompute_hash();

        let report = verify_records(&records);
        assert!(report.hash_mismatches.is_empty());
        assert_eq!(report.chain_breaks, vec![3]);
    }

    #[test]
    fn test_forged_huge_id_is_reported_not_expanded() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        fill(&ledger, &store, 3);
        let mut records = store.read(|t| t.audit.clone());
        records[1].id = u64::MAX;

        let report = verify_records(&records);
        assert_eq!(report.missing_sequences, vec![SequenceGap { first: 2, last: u64::MAX - 1 }]);
        assert_eq!(report.missing_count, u64::MAX - 2);
        assert_eq!(report.out_of_order, vec![3]);
        assert_eq!(report.hash_mismatches, Vec::<u64>::new());
        assert_eq!(report.first_broken, Some(2));

        records.truncate(1);
        records[0].id = u64::MAX;
        let report = verify_records(&records);
        assert_eq!(report.missing_count, u64::MAX - 1);
        assert!(!report.is_intact());
    }

    #[test]
    fn test_append_after_max_id_fails_cleanly() {
        let (ledger, store) = ledger(HashMode::PerRecord);
        fill(&ledger, &store, 1);
        let mut forged = store.read(|t| t.audit[0].clone());
        forged.id = u64::MAX;
        store
            .transact(|tx| {
                tx.push_audit(forged);
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let result = ledger.append(&store, NewAuditEntry::new(event_types::SYSTEM, "after"));
        assert!(matches!(result, Err(StoreError::IdsExhausted("audit"))));
        assert_eq!(store.read(|t| t.audit.len()), 2);
    }

    #[test]
    fn test_empty_ledger_is_intact() {
        let report = verify_records(&[]);
        assert!(report.is_intact());
        assert_eq!(report.head_hash, None);
    }
}
