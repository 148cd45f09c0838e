// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output_log;
pub mod report;
pub mod types;

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{RunnerConfig, resolve_config};
use crate::console::ConsoleObserver;
use crate::exec::ProcessRunner;
use crate::report::{Classification, TerminationReport};
use crate::types::{Invocation, ProcessId};

pub use crate::errors::ProcrunError;
pub use crate::exec::{Canceller, RunEvent, RunHandle, RunObserver};
pub use crate::output_log::OutputLog;

/// Exit status used by the binary when the run was cancelled (SIGINT style).
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the process runner with a console observer
/// - Ctrl-C handling (first Ctrl-C cancels the run, a second one kills it
///   and returns an error)
///
/// Returns `None` for `--dry-run`, otherwise the delivered report.
pub async fn run(args: CliArgs) -> Result<Option<TerminationReport>> {
    let config = resolve_config(args.config.as_deref().map(Path::new))?;
    let invocation = Invocation::new(args.command, args.args);

    if args.dry_run {
        print_dry_run(&invocation, &config);
        return Ok(None);
    }

    let whole_group = config.isolate_process_group;
    let runner = ProcessRunner::new(config);
    let handle = runner.start(invocation, ConsoleObserver::new())?;
    let pid = handle.pid();
    info!(pid, run_id = handle.run_id(), "process started");

    // First Ctrl-C asks for cancellation; the report still arrives normally.
    // A second one gives up on a process that ignores the cancel signal.
    let (force_tx, mut force_rx) = oneshot::channel::<()>();
    let ctrl_c = {
        let canceller = handle.canceller();
        tokio::spawn(async move {
            let mut presses = 0u32;
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                presses += 1;
                match interrupt_action(presses) {
                    InterruptAction::Cancel => {
                        info!(pid, "Ctrl-C received; cancelling process (again to force quit)");
                        canceller.cancel();
                    }
                    InterruptAction::ForceQuit => {
                        let _ = force_tx.send(());
                        return;
                    }
                }
            }
        })
    };

    let report = tokio::select! {
        report = handle.wait() => report,
        Ok(()) = &mut force_rx => {
            if runner.is_running(pid) {
                force_kill(pid, whole_group);
            }
            bail!("interrupted twice; killed process {pid} without waiting for its report");
        }
    };
    ctrl_c.abort();

    let report = report.ok_or_else(|| anyhow!("run ended without a termination report"))?;
    debug!(?report, "run finished");
    Ok(Some(report))
}

/// What the front end does on the n-th Ctrl-C of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    Cancel,
    ForceQuit,
}

pub fn interrupt_action(presses: u32) -> InterruptAction {
    if presses <= 1 {
        InterruptAction::Cancel
    } else {
        InterruptAction::ForceQuit
    }
}

#[cfg(unix)]
fn force_kill(pid: ProcessId, whole_group: bool) {
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);
    let res = if whole_group {
        killpg(target, Signal::SIGKILL)
    } else {
        kill(target, Signal::SIGKILL)
    };
    if let Err(e) = res {
        warn!(pid, error = %e, "failed to kill process");
    }
}

#[cfg(not(unix))]
fn force_kill(pid: ProcessId, _whole_group: bool) {
    warn!(pid, "forced kill is not supported on this platform");
}

/// Map a report to the exit status of the `procrun` process itself.
pub fn exit_code_for(report: &TerminationReport) -> i32 {
    match report.classification {
        Classification::Completed => 0,
        Classification::CancelledByUser => CANCELLED_EXIT_CODE,
        Classification::AbnormalExit { code, .. } if code > 0 => code,
        Classification::AbnormalExit { .. } => 1,
    }
}

/// Simple dry-run output: print the invocation and the effective config.
fn print_dry_run(invocation: &Invocation, config: &RunnerConfig) {
    println!("procrun dry-run");
    println!("  command: {}", invocation.command());
    if invocation.args().is_empty() {
        println!("  args: (none)");
    } else {
        println!("  args:");
        for (i, arg) in invocation.args().iter().enumerate() {
            println!("    [{i}] {arg:?}");
        }
    }
    println!();

    println!("runner:");
    println!("  output_queue_capacity = {}", config.output_queue_capacity);
    println!("  read_buffer_size = {}", config.read_buffer_size);
    println!("  drain_timeout = {:?}", config.drain_timeout);
    println!(
        "  discard_output_after_cancel = {}",
        config.discard_output_after_cancel
    );
    println!("  isolate_process_group = {}", config.isolate_process_group);
    println!("classification:");
    println!("  cancel_signal = {}", config.classification.cancel_signal);

    debug!("dry-run complete (no execution)");
}
