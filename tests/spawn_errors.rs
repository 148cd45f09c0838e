#![cfg(unix)]

mod common;
use crate::common::{RecordingObserver, init_tracing};

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tempfile::NamedTempFile;

use procrun::errors::ProcrunError;
use procrun::exec::ProcessRunner;
use procrun::types::Invocation;

#[tokio::test]
async fn test_missing_executable_fails_synchronously() {
    init_tracing();

    let runner = ProcessRunner::default();
    let observer = RecordingObserver::new();
    let result = runner.start(
        Invocation::new("procrun-definitely-not-installed", ["--version"]),
        observer.clone(),
    );

    match result {
        Err(ProcrunError::Spawn { command, source }) => {
            assert_eq!(command, "procrun-definitely-not-installed");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        Err(e) => panic!("Expected Spawn error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got a run handle"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(observer.events().is_empty());
    assert_eq!(runner.active_count(), 0);
}

#[tokio::test]
async fn test_spawn_error_never_invokes_callbacks() {
    init_tracing();

    let runner = ProcessRunner::default();
    let output_called = Arc::new(AtomicBool::new(false));
    let termination_called = Arc::new(AtomicBool::new(false));

    let out = Arc::clone(&output_called);
    let term = Arc::clone(&termination_called);
    let result = runner.start_with_callbacks(
        Invocation::new("/nonexistent/dir/tool", Vec::<String>::new()),
        move |_| out.store(true, Ordering::SeqCst),
        move |_| term.store(true, Ordering::SeqCst),
    );

    let err = result.expect_err("spawn should fail");
    assert!(err.is_spawn());
    assert!(err.to_string().contains("/nonexistent/dir/tool"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!output_called.load(Ordering::SeqCst));
    assert!(!termination_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_non_executable_file_is_permission_denied() {
    init_tracing();

    let mut script = NamedTempFile::new().unwrap();
    writeln!(script, "#!/bin/sh\necho should not run").unwrap();
    script.flush().unwrap();

    let path = script.path().to_str().unwrap().to_string();
    let runner = ProcessRunner::default();
    let result = runner.start(Invocation::new(path, Vec::<String>::new()), RecordingObserver::new());

    match result {
        Err(ProcrunError::Spawn { source, .. }) => {
            assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
        }
        Err(e) => panic!("Expected Spawn error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got a run handle"),
    }
}
