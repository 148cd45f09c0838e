// src/exec/runner.rs

//! The process runner: spawn, handles and cancellation.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::process::Command;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::errors::{ProcrunError, Result};
use crate::exec::observer::{CallbackObserver, RunObserver};
use crate::exec::pipe::{attach_output, into_async_reader, output_pipe};
use crate::exec::pump::{ReaderContext, spawn_reader};
use crate::exec::supervisor::{DeliveryContext, Supervision, deliver, supervise};
use crate::report::TerminationReport;
use crate::types::{Invocation, ProcessId, RunId};

/// Cheap, cloneable way to request cancellation of one run.
///
/// Cancelling is asynchronous and idempotent: the first request makes the
/// run send its cancel signal, later requests and requests after the
/// process has exited do nothing.
#[derive(Debug, Clone)]
pub struct Canceller {
    run_id: RunId,
    pid: ProcessId,
    tx: mpsc::Sender<()>,
}

impl Canceller {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {
                debug!(run_id = self.run_id, pid = self.pid, "cancellation requested");
            }
            Err(TrySendError::Full(())) => {
                debug!(
                    run_id = self.run_id,
                    pid = self.pid,
                    "cancellation already pending; ignoring repeated request"
                );
            }
            Err(TrySendError::Closed(())) => {
                debug!(
                    run_id = self.run_id,
                    pid = self.pid,
                    "process already finished; cancel is a no-op"
                );
            }
        }
    }
}

/// Table of runs whose process has not been reaped yet, keyed by pid.
///
/// Only used to resolve a bare pid to its run for [`ProcessRunner::cancel`];
/// runs never look at each other's entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveRuns {
    inner: Arc<Mutex<HashMap<ProcessId, Canceller>>>,
}

impl LiveRuns {
    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessId, Canceller>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, canceller: Canceller) {
        self.lock().insert(canceller.pid, canceller);
    }

    fn get(&self, pid: ProcessId) -> Option<Canceller> {
        self.lock().get(&pid).cloned()
    }

    /// Remove `pid` only if it still belongs to `run_id`; a recycled pid may
    /// already have been claimed by a newer run.
    pub(crate) fn remove(&self, pid: ProcessId, run_id: RunId) {
        let mut map = self.lock();
        if map.get(&pid).is_some_and(|c| c.run_id == run_id) {
            map.remove(&pid);
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Live reference to one in-flight execution.
///
/// The pid is valid as soon as [`ProcessRunner::start`] returns, before any
/// output has been produced. Dropping the handle does not stop the run; the
/// observer still receives everything.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    pid: ProcessId,
    canceller: Canceller,
    alive: Arc<AtomicBool>,
    delivery: JoinHandle<Option<TerminationReport>>,
}

impl RunHandle {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// False once the termination report has been handed to the observer.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Wait until the observer has received the termination report.
    ///
    /// Returns `None` only if the run was torn down without one (e.g. the
    /// runtime shut down underneath it).
    pub async fn wait(self) -> Option<TerminationReport> {
        match self.delivery.await {
            Ok(report) => report,
            Err(e) => {
                error!(run_id = self.run_id, pid = self.pid, error = %e, "delivery task failed");
                None
            }
        }
    }
}

/// Starts external processes and relays their output and termination.
///
/// Each run is independent: its own pipe reader, exit supervisor and
/// delivery thread. Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: Arc<RunnerConfig>,
    live: LiveRuns,
    next_run_id: Arc<AtomicU64>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config: Arc::new(config),
            live: LiveRuns::default(),
            next_run_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start `invocation`, reporting to `observer`.
    ///
    /// Fails synchronously with [`ProcrunError::Spawn`] if the process cannot
    /// be created; in that case the observer is dropped without any call.
    pub fn start<O: RunObserver>(&self, invocation: Invocation, observer: O) -> Result<RunHandle> {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        let config = Arc::clone(&self.config);

        info!(
            run_id,
            command = %invocation.command(),
            args = ?invocation.args(),
            "starting process"
        );

        let (pipe_reader, pipe_writer) =
            output_pipe().map_err(|source| spawn_error(run_id, &invocation, source))?;

        // `cmd` is dropped at the end of this block, closing the parent's
        // copies of the write end so the reader sees EOF once the child exits.
        let mut child = {
            let mut cmd = build_command(&invocation, &config);
            attach_output(&mut cmd, pipe_writer)
                .map_err(|source| spawn_error(run_id, &invocation, source))?;
            cmd.spawn()
                .map_err(|source| spawn_error(run_id, &invocation, source))?
        };

        let pid = child.id().ok_or_else(|| {
            spawn_error(
                run_id,
                &invocation,
                std::io::Error::other("process exited before its id could be read"),
            )
        })?;

        debug!(run_id, pid, "process spawned");

        let buffer_size = config.read_buffer_size.max(1);
        let pipe_reader = match into_async_reader(pipe_reader, buffer_size) {
            Ok(reader) => reader,
            Err(e) => {
                // The process is running but its output cannot be read.
                let _ = child.start_kill();
                return Err(spawn_error(run_id, &invocation, e));
            }
        };

        let (event_tx, event_rx) = mpsc::channel(config.output_queue_capacity.max(1));
        let (exited_tx, exited_rx) = watch::channel(false);

        let reader = spawn_reader(
            pipe_reader,
            ReaderContext {
                run_id,
                pid,
                buffer_size,
                drain_timeout: config.drain_timeout,
                events: event_tx.clone(),
                exited: exited_rx,
            },
        );

        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let canceller = Canceller {
            run_id,
            pid,
            tx: cancel_tx,
        };
        self.live.insert(canceller.clone());

        let cancelled = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let delivery_ctx = DeliveryContext {
            run_id,
            pid,
            cancelled: Arc::clone(&cancelled),
            discard_after_cancel: config.discard_output_after_cancel,
            alive: Arc::clone(&alive),
        };
        let delivery =
            tokio::task::spawn_blocking(move || deliver(event_rx, observer, delivery_ctx));

        tokio::spawn(supervise(Supervision {
            run_id,
            pid,
            child,
            reader,
            events: event_tx,
            exited: exited_tx,
            cancel_rx,
            cancelled,
            live: self.live.clone(),
            config,
        }));

        Ok(RunHandle {
            run_id,
            pid,
            canceller,
            alive,
            delivery,
        })
    }

    /// Closure flavour of [`start`](Self::start).
    pub fn start_with_callbacks<F, T>(
        &self,
        invocation: Invocation,
        on_output: F,
        on_termination: T,
    ) -> Result<RunHandle>
    where
        F: FnMut(String) + Send + 'static,
        T: FnOnce(TerminationReport) + Send + 'static,
    {
        self.start(invocation, CallbackObserver::new(on_output, on_termination))
    }

    /// Request cancellation of the run owning `pid`.
    ///
    /// Unknown or already reaped pids are ignored; the OS is never signalled
    /// for a pid this runner no longer owns.
    pub fn cancel(&self, pid: ProcessId) {
        match self.live.get(pid) {
            Some(canceller) => canceller.cancel(),
            None => debug!(pid, "cancel for unknown or finished process; ignoring"),
        }
    }

    /// Whether `pid` belongs to a run whose process has not been reaped.
    pub fn is_running(&self, pid: ProcessId) -> bool {
        self.live.get(pid).is_some()
    }

    /// Number of runs whose process has not been reaped yet.
    pub fn active_count(&self) -> usize {
        self.live.len()
    }
}

fn build_command(invocation: &Invocation, config: &RunnerConfig) -> Command {
    let mut cmd = Command::new(invocation.command());
    cmd.args(invocation.args())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if config.isolate_process_group {
        isolate_process_group(&mut cmd);
    }

    cmd
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

fn spawn_error(run_id: RunId, invocation: &Invocation, source: std::io::Error) -> ProcrunError {
    warn!(
        run_id,
        command = %invocation.command(),
        error = %source,
        "failed to spawn process"
    );
    ProcrunError::Spawn {
        command: invocation.command().to_string(),
        source,
    }
}
