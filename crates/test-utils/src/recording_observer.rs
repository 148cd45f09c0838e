use std::sync::{Arc, Mutex};

use procrun::exec::{RunEvent, RunObserver};
use procrun::report::TerminationReport;
use procrun::types::OutputChunk;

/// An observer that records every callback in the order it was made.
///
/// Clones share the same record, so a test keeps one clone and hands the
/// other to the runner.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<RunEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn chunks(&self) -> Vec<OutputChunk> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Output(chunk) => Some(chunk),
                RunEvent::Terminated(_) => None,
            })
            .collect()
    }

    /// All delivered text, concatenated in delivery order.
    pub fn output(&self) -> String {
        self.chunks().into_iter().map(|c| c.text).collect()
    }

    pub fn reports(&self) -> Vec<TerminationReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Terminated(report) => Some(report),
                RunEvent::Output(_) => None,
            })
            .collect()
    }

    /// True if exactly one report was delivered and nothing came after it.
    pub fn terminated_last_exactly_once(&self) -> bool {
        let events = self.events();
        let reports = events
            .iter()
            .filter(|e| matches!(e, RunEvent::Terminated(_)))
            .count();
        reports == 1 && matches!(events.last(), Some(RunEvent::Terminated(_)))
    }
}

impl RunObserver for RecordingObserver {
    fn on_output(&mut self, chunk: OutputChunk) {
        self.events.lock().unwrap().push(RunEvent::Output(chunk));
    }

    fn on_termination(&mut self, report: TerminationReport) {
        self.events.lock().unwrap().push(RunEvent::Terminated(report));
    }
}
