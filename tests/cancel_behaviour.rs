#![cfg(unix)]

mod common;
use crate::common::{
    RecordingObserver, RunnerConfigBuilder, init_tracing, seq_output, sh, with_timeout,
};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procrun::exec::{ProcessRunner, RunObserver};
use procrun::report::{Classification, TerminationReport};
use procrun::types::{Invocation, OutputChunk};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn test_cancel_live_process_reports_cancelled() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(Invocation::new("sleep", ["30"]), observer.clone())?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert_eq!(report.classification, Classification::CancelledByUser);
    assert_eq!(report.signal, 15);
    assert!(observer.terminated_last_exactly_once());
    Ok(())
}

#[tokio::test]
async fn test_cancel_immediately_after_start() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(Invocation::new("sleep", ["30"]), observer.clone())?;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert!(report.is_cancelled());
    assert_eq!(observer.reports().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_by_pid_through_runner() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(sh("echo started; sleep 30"), observer.clone())?;
    let pid = handle.pid();

    // Wait for the first output so the cancel lands mid-run.
    with_timeout(async {
        while observer.chunks().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    runner.cancel(pid);

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert!(report.is_cancelled());
    assert_eq!(observer.output(), "started\n");
    assert!(observer.terminated_last_exactly_once());
    assert!(!runner.is_running(pid));
    Ok(())
}

#[tokio::test]
async fn test_repeated_cancel_yields_one_report() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(Invocation::new("sleep", ["30"]), observer.clone())?;
    let canceller = handle.canceller();

    for _ in 0..5 {
        canceller.cancel();
        runner.cancel(handle.pid());
    }

    let report = with_timeout(handle.wait()).await.expect("report delivered");
    assert!(report.is_cancelled());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(observer.reports().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_after_exit_is_noop() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(sh("echo done"), observer.clone())?;
    let pid = handle.pid();
    let canceller = handle.canceller();

    let report = with_timeout(handle.wait()).await.expect("report delivered");
    assert!(report.is_success());

    canceller.cancel();
    runner.cancel(pid);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(observer.reports(), vec![report]);
    assert_eq!(observer.output(), "done\n");
    Ok(())
}

#[tokio::test]
async fn test_cancel_unknown_pid_is_ignored() {
    init_tracing();

    let runner = ProcessRunner::default();
    runner.cancel(u32::MAX);
    assert_eq!(runner.active_count(), 0);
}

#[tokio::test]
async fn test_cancel_chatty_process_delivers_nothing_after_report() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(sh("while :; do echo tick; done"), observer.clone())?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert!(report.is_cancelled());
    assert!(observer.terminated_last_exactly_once());
    let output = observer.output();
    assert!(output.starts_with("tick\n"));
    assert!(output.split_inclusive('\n').all(|line| line == "tick\n"));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_discards_undelivered_output() -> TestResult {
    init_tracing();

    // `seq` writes far more than the pipe and queue can hold, so most of it
    // is still pending when the cancel lands.
    let config = RunnerConfigBuilder::new()
        .output_queue_capacity(1)
        .read_buffer_size(1024)
        .build();
    let runner = ProcessRunner::new(config);
    let observer = SlowObserver {
        delay: Duration::from_millis(5),
        ..SlowObserver::default()
    };
    let handle = runner.start(Invocation::new("seq", ["1", "100000"]), observer.clone())?;

    with_timeout(async {
        while observer.seen.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");
    assert!(report.is_cancelled());

    let full = seq_output(100000);
    let delivered: String = observer.seen.lock().unwrap().concat();
    assert!(full.starts_with(&delivered));
    assert!(delivered.len() < full.len() / 2);
    Ok(())
}

#[tokio::test]
async fn test_output_kept_when_cancel_ends_in_clean_exit() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(
        sh("trap 'echo cleanup done; exit 0' TERM; echo ready; while :; do sleep 0.05; done"),
        observer.clone(),
    )?;

    with_timeout(async {
        while observer.chunks().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert_eq!(report.classification, Classification::Completed);
    assert_eq!(observer.output(), "ready\ncleanup done\n");
    assert!(observer.terminated_last_exactly_once());
    Ok(())
}

#[tokio::test]
async fn test_cancel_reaches_whole_process_group() -> TestResult {
    init_tracing();

    // Without group signalling the inner sleep would keep the pipe open
    // far longer than the test timeout.
    let config = RunnerConfigBuilder::new().drain_timeout("10s").build();
    let runner = ProcessRunner::new(config);
    let observer = RecordingObserver::new();
    let handle = runner.start(sh("sleep 30; echo never"), observer.clone())?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");
    assert!(report.is_cancelled());
    assert!(observer.chunks().is_empty());
    assert_eq!(runner.active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_custom_cancel_signal() -> TestResult {
    init_tracing();

    let config = RunnerConfigBuilder::new().cancel_signal(2).build();
    let runner = ProcessRunner::new(config);
    let handle = runner.start(Invocation::new("sleep", ["30"]), RecordingObserver::new())?;

    handle.cancel();
    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert_eq!(report.signal, 2);
    assert_eq!(report.classification, Classification::CancelledByUser);
    Ok(())
}

#[tokio::test]
async fn test_external_kill_is_abnormal() -> TestResult {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    init_tracing();

    let runner = ProcessRunner::default();
    let handle = runner.start(Invocation::new("sleep", ["30"]), RecordingObserver::new())?;

    kill(Pid::from_raw(handle.pid() as i32), Signal::SIGKILL)?;
    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert_eq!(
        report.classification,
        Classification::AbnormalExit { code: -1, signal: 9 }
    );
    Ok(())
}

#[tokio::test]
async fn test_process_that_handles_terminate_and_exits_zero_is_completed() -> TestResult {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let handle = runner.start(
        sh("trap 'exit 0' TERM; echo ready; while :; do sleep 0.05; done"),
        observer.clone(),
    )?;

    with_timeout(async {
        while observer.chunks().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    // Classification follows the observed status, not the request.
    assert_eq!(report.classification, Classification::Completed);
    Ok(())
}

/// Observer whose output callback is slow.
#[derive(Clone, Default)]
struct SlowObserver {
    delay: Duration,
    seen: Arc<Mutex<Vec<String>>>,
    report: Arc<Mutex<Option<TerminationReport>>>,
}

impl RunObserver for SlowObserver {
    fn on_output(&mut self, chunk: OutputChunk) {
        std::thread::sleep(self.delay);
        self.seen.lock().unwrap().push(chunk.text);
    }

    fn on_termination(&mut self, report: TerminationReport) {
        *self.report.lock().unwrap() = Some(report);
    }
}

#[tokio::test]
async fn test_slow_sink_does_not_block_cancellation() -> TestResult {
    init_tracing();

    let config = RunnerConfigBuilder::new()
        .output_queue_capacity(1)
        .read_buffer_size(64)
        .build();
    let runner = ProcessRunner::new(config);
    let observer = SlowObserver {
        delay: Duration::from_millis(200),
        ..SlowObserver::default()
    };
    let handle = runner.start(sh("while :; do echo spam; done"), observer.clone())?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.expect("report delivered");

    assert!(report.is_cancelled());
    assert_eq!(*observer.report.lock().unwrap(), Some(report));
    Ok(())
}
