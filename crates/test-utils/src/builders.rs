#![allow(dead_code)]

use procrun::config::{RawConfigFile, RunnerConfig};

/// Builder for `RunnerConfig` to simplify test setup.
///
/// Goes through the same validation as a config file.
pub struct RunnerConfigBuilder {
    config: RawConfigFile,
}

impl RunnerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn output_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.runner.output_queue_capacity = capacity;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.runner.read_buffer_size = size;
        self
    }

    pub fn drain_timeout(mut self, duration: &str) -> Self {
        self.config.runner.drain_timeout = duration.to_string();
        self
    }

    pub fn discard_output_after_cancel(mut self, val: bool) -> Self {
        self.config.runner.discard_output_after_cancel = val;
        self
    }

    pub fn isolate_process_group(mut self, val: bool) -> Self {
        self.config.runner.isolate_process_group = val;
        self
    }

    pub fn cancel_signal(mut self, signal: i32) -> Self {
        self.config.classification.cancel_signal = signal;
        self
    }

    pub fn build(self) -> RunnerConfig {
        RunnerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for RunnerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
