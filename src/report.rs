// src/report.rs

//! Termination reports and how they are classified.
//!
//! Classification is a policy, not an OS fact: a process that dies from the
//! configured cancel signal is reported as cancelled by the user even when
//! the platform also hands back an exit code (zero included).

use std::fmt;
use std::process::ExitStatus;

use serde::Deserialize;

/// SIGTERM on every Unix the runner targets.
pub const TERMINATE_SIGNAL: i32 = 15;

/// Exit code recorded when the OS did not provide one.
pub const NO_EXIT_CODE: i32 = -1;

/// How a finished process is classified for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Exited normally with code 0.
    Completed,
    /// Ended by the cancel signal.
    CancelledByUser,
    /// Anything else; carries both values for diagnostics.
    AbnormalExit { code: i32, signal: i32 },
}

impl Classification {
    /// Human-readable status line for console display.
    pub fn status_line(&self) -> String {
        match self {
            Classification::Completed => "Process completed successfully.".to_string(),
            Classification::CancelledByUser => "Process was manually terminated.".to_string(),
            Classification::AbnormalExit { code, signal } => format!(
                "Process terminated with exit code: {code} and signal code: {signal}"
            ),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

/// Policy that maps `(exit_code, signal)` to a [`Classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClassificationPolicy {
    /// Signal sent on cancellation and recognised as "cancelled by user".
    #[serde(default = "default_cancel_signal")]
    pub cancel_signal: i32,
}

fn default_cancel_signal() -> i32 {
    TERMINATE_SIGNAL
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            cancel_signal: default_cancel_signal(),
        }
    }
}

impl ClassificationPolicy {
    /// The cancel signal wins over the exit code, including a zero one.
    pub fn classify(&self, exit_code: i32, signal: i32) -> Classification {
        if signal == self.cancel_signal {
            Classification::CancelledByUser
        } else if exit_code == 0 {
            Classification::Completed
        } else {
            Classification::AbnormalExit {
                code: exit_code,
                signal,
            }
        }
    }
}

/// The single terminal notification for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationReport {
    /// Meaningful only if the process exited normally; `-1` otherwise.
    pub exit_code: i32,
    /// `0` if the process was not killed by a signal.
    pub signal: i32,
    pub classification: Classification,
}

impl TerminationReport {
    pub fn new(exit_code: i32, signal: i32, policy: &ClassificationPolicy) -> Self {
        Self {
            exit_code,
            signal,
            classification: policy.classify(exit_code, signal),
        }
    }

    pub fn from_exit_status(status: ExitStatus, policy: &ClassificationPolicy) -> Self {
        let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
        Self::new(exit_code, exit_signal(&status), policy)
    }

    /// Report for a process whose exit could not be observed.
    pub fn wait_failed(policy: &ClassificationPolicy) -> Self {
        Self::new(NO_EXIT_CODE, 0, policy)
    }

    pub fn is_success(&self) -> bool {
        self.classification == Classification::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.classification == Classification::CancelledByUser
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> i32 {
    0
}
