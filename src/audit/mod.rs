//! Tamper-evident audit trail.
//!
//! # Data Flow
//! ```text
//! producer (service operation)
//!     → NewAuditEntry
//!     → AuditLedger::append_in (inside the producer's unit of work)
//!         → sequence id, timestamp, integrity hash
//!     → Store commit (durable, all-or-nothing with the business write)
//!     → AuditLedger::committed (metrics, `audit` log target)
//! ```
//!
//! # Hash Modes
//! - `per_record` (default): each hash covers only its own record. Field
//!   edits are detectable; deletion of the newest record or wholesale
//!   replacement with rehashed records is not
//! - `chained`: each hash also covers the previous record's hash, so edits,
//!   reordering and interior deletion break every later link

pub mod ledger;
pub mod record;

pub use ledger::{verify_records, AuditFilter, AuditLedger, SequenceGap, VerificationReport};
pub use record::{event_types, integrity_digest, AuditRecord, NewAuditEntry, GENESIS_HASH};
