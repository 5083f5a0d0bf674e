use std::path::PathBuf;

use crate::export;

/// Audit record for one branch decision. Written for diagnostics only; the
/// running system never reads these back.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub node_id: u64,
    pub branch_down: u64,
    pub branch_up: u64,
    /// Best known dual bound at decision time.
    pub best_objval: f64,
    /// Relaxed objective at the node.
    pub objval: f64,
    pub incumbent: f64,
    pub cutoff: f64,
    pub gap: f64,
}

/// Append-only decision log with periodic bulk flushes to CSV.
///
/// Every `flush_interval` appends the whole table is rewritten to `path`;
/// write failures are logged and do not interrupt the search.
pub struct DecisionLog {
    records: Vec<DecisionRecord>,
    path: Option<PathBuf>,
    flush_interval: usize,
}

impl DecisionLog {
    pub fn new(path: Option<PathBuf>, flush_interval: usize) -> Self {
        DecisionLog {
            records: Vec::new(),
            path,
            flush_interval: flush_interval.max(1),
        }
    }

    /// In-memory log without persistence (tests, throwaway runs).
    pub fn in_memory() -> Self {
        Self::new(None, usize::MAX)
    }

    pub fn append(&mut self, record: DecisionRecord) {
        self.records.push(record);
        if self.records.len() % self.flush_interval == 0 {
            self.flush();
        }
    }

    /// Rewrite the CSV with everything recorded so far.
    pub fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = export::write_decision_records(path, &self.records) {
            log::warn!("failed to flush decision log to {}: {e}", path.display());
        }
    }

    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
