// src/console.rs

//! Observer used by the `procrun` binary: writes output to stdout as it
//! arrives and finishes with the status line.

use std::io::{self, Write};

use tracing::debug;

use crate::exec::RunObserver;
use crate::report::TerminationReport;
use crate::types::OutputChunk;

/// Prints the combined output stream of a run to stdout.
#[derive(Debug)]
pub struct ConsoleObserver {
    ends_with_newline: bool,
    write_failed: bool,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            ends_with_newline: true,
            write_failed: false,
        }
    }

    fn write(&mut self, text: &str) {
        if self.write_failed {
            return;
        }
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            // Typically a closed pipe (`procrun ... | head`).
            debug!(error = %e, "stdout write failed; suppressing further output");
            self.write_failed = true;
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_output(&mut self, chunk: OutputChunk) {
        self.ends_with_newline = chunk.text.ends_with('\n');
        self.write(&chunk.text);
    }

    fn on_termination(&mut self, report: TerminationReport) {
        let sep = if self.ends_with_newline { "" } else { "\n" };
        let line = format!("{sep}{}\n", report.classification.status_line());
        self.write(&line);
    }
}
