//! Audit ledger atomicity and tamper detection against persisted stores.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use ethics_monitor::audit::{event_types, SequenceGap};
use ethics_monitor::config::HashMode;
use ethics_monitor::security::{SystemClock, TokenService};
use ethics_monitor::service::{MonitorService, NewDecision, NewLogEntry, ServiceError};
use ethics_monitor::storage::{JsonLinesBackend, Store, StoreError};
use serde_json::Value;

mod common;

use common::FlakyBackend;

fn decision(owner: &str, score: f64) -> NewDecision {
    NewDecision {
        owner_id: owner.to_string(),
        label: "credit_approved".to_string(),
        score,
        sensitive_attribute: Some("age=52".to_string()),
    }
}

fn token_for(config: &ethics_monitor::MonitorConfig, principal: &str, role: &str) -> String {
    TokenService::new(config.auth.jwt_secret.as_bytes(), Arc::new(SystemClock))
        .issue(principal, role, Duration::hours(1))
        .unwrap()
        .token
}

#[test]
fn test_failed_commit_leaves_no_orphans() {
    let config = common::test_config();
    let fail = Arc::new(AtomicBool::new(false));
    let store = Store::open(FlakyBackend { fail: fail.clone() }).unwrap();
    let service = MonitorService::new(&config, store, Arc::new(SystemClock)).unwrap();

    service.register_user(None, common::new_user("owner", "analyst")).unwrap();
    let token = token_for(&config, "owner", "analyst");
    let before = service.store().read(|t| (t.decisions.len(), t.audit.len()));

    fail.store(true, Ordering::SeqCst);
    let result = service.create_decision(&token, decision("owner", 0.8));
    assert!(matches!(result, Err(ServiceError::Store(StoreError::Backend(_)))));
    assert_eq!(service.store().read(|t| (t.decisions.len(), t.audit.len())), before);

    fail.store(false, Ordering::SeqCst);
    let created = service.create_decision(&token, decision("owner", 0.8)).unwrap();
    assert_eq!(created.id, 1, "rolled-back id must not be consumed");

    let paired = service
        .store()
        .read(|t| t.audit.iter().filter(|r| r.subject_id == Some(created.id)).count());
    assert_eq!(paired, 1);
    assert!(service.integrity_check().is_intact());
}

#[test]
fn test_edited_file_fails_verification() {
    let path = common::temp_store_path("tamper");
    let mut config = common::test_config();
    config.storage.path = Some(path.to_string_lossy().into_owned());

    {
        let service = MonitorService::from_config(&config).unwrap();
        service.register_user(None, common::new_user("root", "admin")).unwrap();
        service.register_user(None, common::new_user("analyst", "analyst")).unwrap();
        let token = token_for(&config, "root", "admin");
        let d = service.create_decision(&token, decision("analyst", 0.3)).unwrap();
        service
            .append_log(
                &token,
                NewLogEntry {
                    decision_id: d.id,
                    event_type: None,
                    message: "manual review requested".to_string(),
                },
            )
            .unwrap();
        assert!(service.integrity_check().is_intact());
    }

    // Rewrite the message of record 3 directly on disk.
    common::rewrite_journal_audit(&path, |record| {
        if record["id"] == 3 {
            record["message"] = Value::String("Decision 1 recorded: credit_denied".to_string());
        }
        true
    });

    let reopened = MonitorService::from_config(&config).unwrap();
    let report = reopened.integrity_check();
    assert!(!report.is_intact());
    assert_eq!(report.hash_mismatches, vec![3]);
    assert_eq!(report.first_broken, Some(3));

    std::fs::remove_file(&path).unwrap_or_default();
}

#[test]
fn test_chained_ledger_detects_interior_deletion() {
    let path = common::temp_store_path("chain");
    let mut config = common::test_config();
    config.audit.hash_mode = HashMode::Chained;

    let store = Store::open(JsonLinesBackend::new(&path)).unwrap();
    let service = MonitorService::new(&config, store, Arc::new(SystemClock)).unwrap();
    for name in ["root", "alice", "bob", "carol"] {
        let role = if name == "root" { "admin" } else { "viewer" };
        service.register_user(None, common::new_user(name, role)).unwrap();
    }
    drop(service);

    let audit = common::journal_audit(&path);
    assert_eq!(audit.len(), 4);
    assert_eq!(audit[1]["previous_hash"], audit[0]["integrity_hash"]);
    common::rewrite_journal_audit(&path, |record| record["id"] != 2);

    let reopened = MonitorService::new(
        &config,
        Store::open(JsonLinesBackend::new(&path)).unwrap(),
        Arc::new(SystemClock),
    )
    .unwrap();
    let report = reopened.integrity_check();
    assert!(report.hash_mismatches.is_empty(), "each remaining record still hashes cleanly");
    assert_eq!(report.chain_breaks, vec![3]);
    assert_eq!(report.missing_sequences, vec![SequenceGap { first: 2, last: 2 }]);
    assert_eq!(report.first_broken, Some(2));

    std::fs::remove_file(&path).unwrap_or_default();
}

#[test]
fn test_ledger_survives_restart_and_keeps_sequence() {
    let path = common::temp_store_path("restart");
    let mut config = common::test_config();
    config.storage.path = Some(path.to_string_lossy().into_owned());

    {
        let service = MonitorService::from_config(&config).unwrap();
        service.record_system_event("first boot").unwrap();
    }
    let service = MonitorService::from_config(&config).unwrap();
    let record = service.record_system_event("second boot").unwrap();
    assert_eq!(record.id, 2);
    assert_eq!(record.event_type, event_types::SYSTEM);
    assert!(service.integrity_check().is_intact());

    std::fs::remove_file(&path).unwrap_or_default();
}

#[test]
fn test_forged_max_id_is_reported_and_blocks_appends() {
    let path = common::temp_store_path("max-id");
    let mut config = common::test_config();
    config.storage.path = Some(path.to_string_lossy().into_owned());

    {
        let service = MonitorService::from_config(&config).unwrap();
        for message in ["one", "two", "three"] {
            service.record_system_event(message).unwrap();
        }
    }
    common::rewrite_journal_audit(&path, |record| {
        if record["id"] == 3 {
            record["id"] = Value::from(u64::MAX);
        }
        true
    });

    let service = MonitorService::from_config(&config).unwrap();
    let report = service.integrity_check();
    assert!(!report.is_intact());
    assert_eq!(report.missing_sequences, vec![SequenceGap { first: 3, last: u64::MAX - 1 }]);
    assert_eq!(report.first_broken, Some(3));

    let next = service.record_system_event("four");
    assert!(matches!(next, Err(ServiceError::Store(StoreError::IdsExhausted("audit")))));
    assert_eq!(common::journal_audit(&path).len(), 3);

    std::fs::remove_file(&path).unwrap_or_default();
}

#[test]
fn test_each_commit_appends_one_journal_line() {
    let path = common::temp_store_path("journal");
    let mut config = common::test_config();
    config.storage.path = Some(path.to_string_lossy().into_owned());

    let service = MonitorService::from_config(&config).unwrap();
    service.register_user(None, common::new_user("root", "admin")).unwrap();
    let first_commit = std::fs::read(&path).unwrap();

    for i in 0..20 {
        service.record_system_event(&format!("heartbeat {i}")).unwrap();
    }
    let journal = std::fs::read_to_string(&path).unwrap();
    assert!(journal.as_bytes().starts_with(&first_commit));
    assert_eq!(journal.lines().count(), 21);
    assert!(journal.lines().skip(1).all(|line| line.len() < first_commit.len() + 200));

    let reopened = MonitorService::from_config(&config).unwrap();
    assert_eq!(reopened.store().read(|t| t.audit.len()), 21);
    assert!(reopened.integrity_check().is_intact());

    std::fs::remove_file(&path).unwrap_or_default();
}
