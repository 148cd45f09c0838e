// src/exec/observer.rs

//! Observer abstraction through which a run reports back to its caller.
//!
//! The runner talks to a `RunObserver` instead of a fixed pair of closures.
//! This keeps the delivery loop independent from how callers consume events:
//!
//! - `CallbackObserver` wraps plain closures (`on_output`, `on_termination`).
//! - `ChannelObserver` forwards everything into a `tokio::sync::mpsc`
//!   channel for async consumers.
//! - Tests can provide their own observer that records callbacks.
//!
//! Observer methods are invoked from a blocking thread owned by the run, so
//! they may block or be slow without stalling the rest of the runtime.

use tokio::sync::mpsc;
use tracing::debug;

use crate::report::TerminationReport;
use crate::types::OutputChunk;

/// Event flowing from a run to its observer, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A non-empty fragment of the combined output stream.
    Output(OutputChunk),
    /// The process has exited and all of its output has been delivered.
    /// Always the last event of a run.
    Terminated(TerminationReport),
}

/// Receives the output and the termination of exactly one run.
///
/// For every successfully started run, `on_output` is called zero or more
/// times and then `on_termination` exactly once. Nothing is called after
/// `on_termination`.
pub trait RunObserver: Send + 'static {
    fn on_output(&mut self, chunk: OutputChunk);

    fn on_termination(&mut self, report: TerminationReport);
}

impl RunObserver for Box<dyn RunObserver> {
    fn on_output(&mut self, chunk: OutputChunk) {
        (**self).on_output(chunk);
    }

    fn on_termination(&mut self, report: TerminationReport) {
        (**self).on_termination(report);
    }
}

/// Observer built from two closures.
pub struct CallbackObserver<F, T> {
    on_output: F,
    on_termination: Option<T>,
}

impl<F, T> CallbackObserver<F, T>
where
    F: FnMut(String) + Send + 'static,
    T: FnOnce(TerminationReport) + Send + 'static,
{
    pub fn new(on_output: F, on_termination: T) -> Self {
        Self {
            on_output,
            on_termination: Some(on_termination),
        }
    }
}

impl<F, T> RunObserver for CallbackObserver<F, T>
where
    F: FnMut(String) + Send + 'static,
    T: FnOnce(TerminationReport) + Send + 'static,
{
    fn on_output(&mut self, chunk: OutputChunk) {
        (self.on_output)(chunk.text);
    }

    fn on_termination(&mut self, report: TerminationReport) {
        if let Some(callback) = self.on_termination.take() {
            callback(report);
        }
    }
}

/// Observer that forwards every event into an mpsc channel.
///
/// The channel is bounded; when the receiver falls behind, delivery waits,
/// which in turn pushes back on the pipe reader.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelObserver {
    /// Create an observer plus the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn forward(&self, event: RunEvent) {
        // Runs on the delivery thread, never inside the async runtime.
        if self.tx.blocking_send(event).is_err() {
            debug!("run event receiver dropped; discarding event");
        }
    }
}

impl RunObserver for ChannelObserver {
    fn on_output(&mut self, chunk: OutputChunk) {
        self.forward(RunEvent::Output(chunk));
    }

    fn on_termination(&mut self, report: TerminationReport) {
        self.forward(RunEvent::Terminated(report));
    }
}
