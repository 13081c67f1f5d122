//! Durability backends for the record store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::storage::error::StoreResult;
use crate::storage::tables::{Changes, Tables};

/// Where committed units of work are made durable.
///
/// `commit` must not return until the changes survive a crash, and must
/// leave previously committed state intact if it fails.
pub trait Backend: Send + Sync {
    fn load(&self) -> StoreResult<Option<Tables>>;

    fn commit(&self, changes: &Changes) -> StoreResult<()>;
}

/// Process-memory only. Nothing survives a restart.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl Backend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Tables>> {
        Ok(None)
    }

    fn commit(&self, _changes: &Changes) -> StoreResult<()> {
        Ok(())
    }
}

/// Append-only journal: one JSON line per committed unit of work.
///
/// # Recovery
/// A crash mid-append leaves a final line without its newline. `load`
/// discards and truncates that line; every newline-terminated line must
/// parse or the journal is reported corrupt.
#[derive(Debug, Clone)]
pub struct JsonLinesBackend {
    path: PathBuf,
}

impl JsonLinesBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for JsonLinesBackend {
    fn load(&self) -> StoreResult<Option<Tables>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut tables = Tables::default();
        let mut line = String::new();
        let mut intact_len = 0u64;
        let mut commits = 0usize;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            if !line.ends_with('\n') {
                tracing::warn!(
                    path = %self.path.display(),
                    offset = intact_len,
                    "Discarding incomplete trailing commit"
                );
                OpenOptions::new().write(true).open(&self.path)?.set_len(intact_len)?;
                break;
            }
            if !line.trim().is_empty() {
                let changes: Changes = serde_json::from_str(&line)?;
                tables.apply(changes);
                commits += 1;
            }
            intact_len += read as u64;
        }

        tracing::info!(
            path = %self.path.display(),
            commits,
            principals = tables.principals.len(),
            decisions = tables.decisions.len(),
            audit_records = tables.audit.len(),
            "Replayed record journal"
        );
        Ok(Some(tables))
    }

    fn commit(&self, changes: &Changes) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(changes)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let committed_len = file.metadata()?.len();
        if let Err(e) = file.write_all(&line).and_then(|()| file.sync_data()) {
            // Leave the journal ending on the last whole commit.
            if let Err(truncate) = file.set_len(committed_len) {
                tracing::error!(error = %truncate, "Failed to trim partial commit from journal");
            }
            return Err(e.into());
        }
        Ok(())
    }
}
