// src/exec/supervisor.rs

//! Per-run background tasks: the exit supervisor and the delivery loop.
//!
//! - [`supervise`] waits for the child to exit (or for a cancellation
//!   request), waits for the pipe reader to drain, and enqueues the single
//!   termination report behind the last chunk.
//! - [`deliver`] runs on a blocking thread and hands queued events to the
//!   observer in order. It is the only place observer code runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::exec::observer::{RunEvent, RunObserver};
use crate::exec::runner::LiveRuns;
use crate::report::TerminationReport;
use crate::types::{ProcessId, RunId};

/// Everything the exit supervisor owns for one run.
pub(crate) struct Supervision {
    pub run_id: RunId,
    pub pid: ProcessId,
    pub child: Child,
    pub reader: JoinHandle<()>,
    pub events: mpsc::Sender<RunEvent>,
    pub exited: watch::Sender<bool>,
    pub cancel_rx: mpsc::Receiver<()>,
    /// Set once the reaped status classifies as cancelled by the user.
    pub cancelled: Arc<AtomicBool>,
    pub live: LiveRuns,
    pub config: Arc<RunnerConfig>,
}

/// Drive one run from spawn to its termination report.
pub(crate) async fn supervise(mut sup: Supervision) {
    let report = wait_for_exit(&mut sup).await;
    if report.is_cancelled() {
        sup.cancelled.store(true, Ordering::Release);
    }

    // The pid may be recycled by the OS from here on.
    sup.live.remove(sup.pid, sup.run_id);
    let _ = sup.exited.send(true);

    if let Err(e) = (&mut sup.reader).await {
        warn!(run_id = sup.run_id, pid = sup.pid, error = %e, "output reader task failed");
    }

    debug!(
        run_id = sup.run_id,
        pid = sup.pid,
        classification = ?report.classification,
        "output drained; sending termination report"
    );

    if sup.events.send(RunEvent::Terminated(report)).await.is_err() {
        error!(
            run_id = sup.run_id,
            pid = sup.pid,
            "delivery loop ended before the termination report was sent"
        );
    }
}

/// Either the process exits on its own, or a cancellation request arrives
/// first, in which case the cancel signal is sent and we keep waiting.
async fn wait_for_exit(sup: &mut Supervision) -> TerminationReport {
    let config = Arc::clone(&sup.config);
    let policy = &config.classification;
    let mut listening = true;

    loop {
        tokio::select! {
            status_res = sup.child.wait() => {
                return match status_res {
                    Ok(status) => {
                        let report = TerminationReport::from_exit_status(status, policy);
                        info!(
                            run_id = sup.run_id,
                            pid = sup.pid,
                            exit_code = report.exit_code,
                            signal = report.signal,
                            classification = ?report.classification,
                            "process exited"
                        );
                        report
                    }
                    Err(e) => {
                        error!(
                            run_id = sup.run_id,
                            pid = sup.pid,
                            error = %e,
                            "failed to wait for process; reporting abnormal exit"
                        );
                        TerminationReport::wait_failed(policy)
                    }
                };
            }

            request = sup.cancel_rx.recv(), if listening => {
                match request {
                    Some(()) => {
                        listening = false;
                        info!(
                            run_id = sup.run_id,
                            pid = sup.pid,
                            signal = policy.cancel_signal,
                            "cancellation requested; signalling process"
                        );
                        if let Err(e) = send_cancel_signal(&mut sup.child, sup.pid, &config) {
                            warn!(
                                run_id = sup.run_id,
                                pid = sup.pid,
                                error = %e,
                                "failed to signal process on cancellation"
                            );
                        }
                    }
                    None => {
                        // Every canceller is gone; only the exit is left to watch.
                        listening = false;
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn send_cancel_signal(_child: &mut Child, pid: ProcessId, config: &RunnerConfig) -> Result<()> {
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let signal = Signal::try_from(config.classification.cancel_signal)
        .with_context(|| format!("invalid cancel signal {}", config.classification.cancel_signal))?;
    let target = Pid::from_raw(pid as i32);

    // The child has not been reaped yet, so the pid still refers to it.
    if config.isolate_process_group {
        killpg(target, signal).with_context(|| format!("sending {signal} to process group {pid}"))?;
    } else {
        kill(target, signal).with_context(|| format!("sending {signal} to process {pid}"))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_cancel_signal(child: &mut Child, pid: ProcessId, _config: &RunnerConfig) -> Result<()> {
    child
        .start_kill()
        .with_context(|| format!("terminating process {pid}"))
}

/// State shared between the delivery loop and the rest of the run.
pub(crate) struct DeliveryContext {
    pub run_id: RunId,
    pub pid: ProcessId,
    pub cancelled: Arc<AtomicBool>,
    pub discard_after_cancel: bool,
    /// Cleared right before the termination report is handed over.
    pub alive: Arc<AtomicBool>,
}

/// Blocking delivery loop. Returns the report it delivered, if any.
pub(crate) fn deliver<O: RunObserver>(
    mut events: mpsc::Receiver<RunEvent>,
    mut observer: O,
    ctx: DeliveryContext,
) -> Option<TerminationReport> {
    let mut discarded_bytes = 0usize;

    while let Some(event) = events.blocking_recv() {
        match event {
            RunEvent::Output(chunk) => {
                if ctx.discard_after_cancel && ctx.cancelled.load(Ordering::Acquire) {
                    discarded_bytes += chunk.text.len();
                    continue;
                }
                observer.on_output(chunk);
            }
            RunEvent::Terminated(report) => {
                if discarded_bytes > 0 {
                    debug!(
                        run_id = ctx.run_id,
                        pid = ctx.pid,
                        discarded_bytes,
                        "dropped output of a cancelled run"
                    );
                }
                ctx.alive.store(false, Ordering::Release);
                observer.on_termination(report);
                debug!(run_id = ctx.run_id, pid = ctx.pid, "termination report delivered");
                return Some(report);
            }
        }
    }

    ctx.alive.store(false, Ordering::Release);
    error!(
        run_id = ctx.run_id,
        pid = ctx.pid,
        "event queue closed without a termination report"
    );
    None
}
