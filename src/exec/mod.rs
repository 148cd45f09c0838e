// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs external commands with `tokio::process::Command` and
//! relays their output and termination to a caller-supplied observer.
//!
//! - [`runner`] owns spawning, run handles and cancellation.
//! - `pipe` creates the single pipe shared by the child's stdout and stderr.
//! - [`pump`] contains the pipe reader and the incremental UTF-8 decoder.
//! - [`supervisor`] waits for exit, sends the cancel signal, and runs the
//!   delivery loop that calls the observer.
//! - [`observer`] provides the `RunObserver` trait plus closure- and
//!   channel-based implementations.

pub mod observer;
mod pipe;
pub mod pump;
pub mod runner;
mod supervisor;

pub use observer::{CallbackObserver, ChannelObserver, RunEvent, RunObserver};
pub use pump::Utf8Chunker;
pub use runner::{Canceller, ProcessRunner, RunHandle};
