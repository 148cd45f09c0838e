// src/output_log.rs

//! Append-only output log for callers that accumulate a run's output for
//! display.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::exec::RunObserver;
use crate::report::TerminationReport;
use crate::types::OutputChunk;

/// Growable text log, optionally bounded in bytes.
///
/// When bounded, the oldest whole entries are dropped first. The newest entry
/// is always kept, even if it alone exceeds the bound.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    entries: VecDeque<String>,
    len_bytes: usize,
    max_bytes: Option<usize>,
    dropped_entries: usize,
    dropped_bytes: usize,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::default()
        }
    }

    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.len_bytes += text.len();
        self.entries.push_back(text.to_string());
        self.evict();
    }

    fn evict(&mut self) {
        let Some(max) = self.max_bytes else {
            return;
        };
        while self.len_bytes > max && self.entries.len() > 1 {
            if let Some(old) = self.entries.pop_front() {
                self.len_bytes -= old.len();
                self.dropped_entries += 1;
                self.dropped_bytes += old.len();
            }
        }
    }

    /// Everything currently retained, concatenated.
    pub fn contents(&self) -> String {
        let mut out = String::with_capacity(self.len_bytes);
        for entry in &self.entries {
            out.push_str(entry);
        }
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.len_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn dropped_entries(&self) -> usize {
        self.dropped_entries
    }

    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    /// True if anything has ever been evicted.
    pub fn is_truncated(&self) -> bool {
        self.dropped_entries > 0
    }

    /// Bytes ever appended, retained or not.
    pub fn total_bytes(&self) -> usize {
        self.len_bytes + self.dropped_bytes
    }

    /// Forget retained output; the drop counters are reset as well.
    pub fn clear(&mut self) {
        let max_bytes = self.max_bytes;
        *self = Self {
            max_bytes,
            ..Self::default()
        };
    }
}

/// Log shared between an observer and whoever displays it.
pub type SharedOutputLog = Arc<Mutex<OutputLog>>;

/// Observer that appends every chunk to a shared [`OutputLog`] and, on
/// termination, appends the status line of the classification.
#[derive(Debug, Clone)]
pub struct LogObserver {
    log: SharedOutputLog,
    report: Arc<Mutex<Option<TerminationReport>>>,
}

impl LogObserver {
    pub fn new(log: SharedOutputLog) -> Self {
        Self {
            log,
            report: Arc::new(Mutex::new(None)),
        }
    }

    pub fn log(&self) -> SharedOutputLog {
        Arc::clone(&self.log)
    }

    /// The report, once delivered.
    pub fn report(&self) -> Option<TerminationReport> {
        *self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, text: &str) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(text);
    }
}

impl RunObserver for LogObserver {
    fn on_output(&mut self, chunk: OutputChunk) {
        self.append(&chunk.text);
    }

    fn on_termination(&mut self, report: TerminationReport) {
        self.append(&format!("\n{}\n", report.classification.status_line()));
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }
}
