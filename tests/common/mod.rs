#![allow(dead_code, unused_imports)]

pub use procrun_test_utils::builders::RunnerConfigBuilder;
pub use procrun_test_utils::{init_tracing, sh, with_timeout, RecordingObserver};

/// Exactly what `seq 1 n` prints.
pub fn seq_output(n: usize) -> String {
    (1..=n).map(|i| format!("{i}\n")).collect()
}
