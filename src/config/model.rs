// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::report::ClassificationPolicy;

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [runner]
/// output_queue_capacity = 64
/// read_buffer_size = 8192
/// drain_timeout = "250ms"
/// discard_output_after_cancel = true
/// isolate_process_group = true
///
/// [classification]
/// cancel_signal = 15
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Runner tunables from `[runner]`.
    #[serde(default)]
    pub runner: RunnerSection,

    /// Termination classification policy from `[classification]`.
    #[serde(default)]
    pub classification: ClassificationPolicy,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Capacity of the bounded queue between the pipe reader and the
    /// observer. When full, the reader stops and the pipe fills up.
    #[serde(default = "default_output_queue_capacity")]
    pub output_queue_capacity: usize,

    /// Size of a single read from a pipe, in bytes.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// How long a pipe may stay idle after the process exited before the
    /// reader gives up on it (e.g. `"250ms"`, `"1s"`).
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,

    /// Drop output that has not reached the observer yet once the process
    /// has been reaped as cancelled by the user.
    #[serde(default = "default_true")]
    pub discard_output_after_cancel: bool,

    /// Start each child in its own process group and signal the whole group
    /// on cancellation. Ignored on non-Unix hosts.
    #[serde(default = "default_true")]
    pub isolate_process_group: bool,
}

fn default_output_queue_capacity() -> usize {
    64
}

fn default_read_buffer_size() -> usize {
    8192
}

fn default_drain_timeout() -> String {
    "250ms".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            output_queue_capacity: default_output_queue_capacity(),
            read_buffer_size: default_read_buffer_size(),
            drain_timeout: default_drain_timeout(),
            discard_output_after_cancel: default_true(),
            isolate_process_group: default_true(),
        }
    }
}

/// Validated runner configuration.
///
/// Obtain one through `RunnerConfig::try_from(RawConfigFile)` (see
/// `validate.rs`) or `RunnerConfig::default()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub output_queue_capacity: usize,
    pub read_buffer_size: usize,
    pub drain_timeout: Duration,
    pub discard_output_after_cancel: bool,
    pub isolate_process_group: bool,
    pub classification: ClassificationPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_queue_capacity: default_output_queue_capacity(),
            read_buffer_size: default_read_buffer_size(),
            drain_timeout: Duration::from_millis(250),
            discard_output_after_cancel: true,
            isolate_process_group: true,
            classification: ClassificationPolicy::default(),
        }
    }
}
