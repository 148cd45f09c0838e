// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawConfigFile, RunnerConfig};
use crate::errors::{ProcrunError, Result};

impl TryFrom<RawConfigFile> for RunnerConfig {
    type Error = ProcrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let drain_timeout =
            parse_duration(&raw.runner.drain_timeout).map_err(ProcrunError::ConfigError)?;

        Ok(RunnerConfig {
            output_queue_capacity: raw.runner.output_queue_capacity,
            read_buffer_size: raw.runner.read_buffer_size,
            drain_timeout,
            discard_output_after_cancel: raw.runner.discard_output_after_cancel,
            isolate_process_group: raw.runner.isolate_process_group,
            classification: raw.classification,
        })
    }
}

/// Check the invariants of a raw config without converting it.
pub fn validate_config(raw: &RawConfigFile) -> Result<()> {
    validate_raw_config(raw)?;
    parse_duration(&raw.runner.drain_timeout).map_err(ProcrunError::ConfigError)?;
    Ok(())
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_runner_section(cfg)?;
    validate_classification(cfg)?;
    Ok(())
}

fn validate_runner_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.output_queue_capacity == 0 {
        return Err(ProcrunError::ConfigError(
            "[runner].output_queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.runner.read_buffer_size == 0 {
        return Err(ProcrunError::ConfigError(
            "[runner].read_buffer_size must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_classification(cfg: &RawConfigFile) -> Result<()> {
    let signal = cfg.classification.cancel_signal;
    if signal <= 0 {
        return Err(ProcrunError::ConfigError(format!(
            "[classification].cancel_signal must be a positive signal number (got {signal})"
        )));
    }

    if !is_known_signal(signal) {
        return Err(ProcrunError::ConfigError(format!(
            "[classification].cancel_signal {signal} is not a valid signal on this platform"
        )));
    }

    Ok(())
}

#[cfg(unix)]
fn is_known_signal(signal: i32) -> bool {
    nix::sys::signal::Signal::try_from(signal).is_ok()
}

#[cfg(not(unix))]
fn is_known_signal(_signal: i32) -> bool {
    true
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
