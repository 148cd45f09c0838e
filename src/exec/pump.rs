// src/exec/pump.rs

//! Output pipe reader.
//!
//! stdout and stderr of the child are the two write ends of one pipe, so a
//! single reader task sees their writes in the order the process made them.
//! The reader pushes decoded text into the run's bounded event queue. A full
//! queue stalls the reader, which leaves the data in the OS pipe and
//! eventually blocks the child's writes: memory stays bounded no matter how
//! slow the observer is.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace, warn};

use crate::exec::observer::RunEvent;
use crate::types::{OutputChunk, ProcessId, RunId};

/// Incremental UTF-8 decoder for pipe reads.
///
/// A multi-byte sequence cut in half by a read boundary is held back and
/// emitted whole with the next read. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns whatever text is complete so far.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let keep = incomplete_tail_len(&self.pending);
        let ready = self.pending.len() - keep;
        if ready == 0 {
            return None;
        }

        let text = String::from_utf8_lossy(&self.pending[..ready]).into_owned();
        self.pending.drain(..ready);
        Some(text)
    }

    /// Flush anything still held back (the stream has ended).
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(text)
    }
}

/// Length of a trailing, not yet complete, UTF-8 sequence.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            // continuation byte, keep looking for the lead byte
            continue;
        }
        let needed = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Everything the pipe reader needs besides the pipe itself.
pub(crate) struct ReaderContext {
    pub run_id: RunId,
    pub pid: ProcessId,
    pub buffer_size: usize,
    pub drain_timeout: Duration,
    pub events: mpsc::Sender<RunEvent>,
    /// Flips to `true` once the process has been reaped.
    pub exited: watch::Receiver<bool>,
}

/// Spawn the reader task for the combined output pipe.
///
/// The task ends on EOF, on a read error, when the event queue is closed, or
/// when the pipe stays idle for `drain_timeout` after the process exited.
pub(crate) fn spawn_reader<R>(reader: R, ctx: ReaderContext) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(pump(reader, ctx))
}

async fn pump<R>(mut reader: R, mut ctx: ReaderContext)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; ctx.buffer_size];
    let mut chunker = Utf8Chunker::new();
    let mut exited = *ctx.exited.borrow();
    let mut total_bytes = 0usize;

    loop {
        let read = if exited {
            match time::timeout(ctx.drain_timeout, reader.read(&mut buf)).await {
                Ok(res) => res,
                Err(_) => {
                    debug!(
                        run_id = ctx.run_id,
                        pid = ctx.pid,
                        "pipe idle after process exit; stop reading"
                    );
                    break;
                }
            }
        } else {
            tokio::select! {
                res = reader.read(&mut buf) => res,
                _ = ctx.exited.changed() => {
                    // A dropped sender also means the wait is over.
                    exited = true;
                    continue;
                }
            }
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                total_bytes += n;
                trace!(run_id = ctx.run_id, bytes = n, "read from pipe");
                if let Some(text) = chunker.push(&buf[..n]) {
                    if !send_chunk(&ctx, text).await {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(
                    run_id = ctx.run_id,
                    pid = ctx.pid,
                    error = %e,
                    "read error on output pipe; treating stream as ended"
                );
                break;
            }
        }
    }

    if let Some(text) = chunker.finish() {
        send_chunk(&ctx, text).await;
    }

    debug!(
        run_id = ctx.run_id,
        pid = ctx.pid,
        total_bytes,
        "output reader finished"
    );
}

/// Returns false once nobody is listening anymore.
async fn send_chunk(ctx: &ReaderContext, text: String) -> bool {
    if text.is_empty() {
        return true;
    }

    let chunk = OutputChunk::new(text);
    if ctx.events.send(RunEvent::Output(chunk)).await.is_err() {
        debug!(
            run_id = ctx.run_id,
            pid = ctx.pid,
            "event queue closed; dropping remaining output"
        );
        return false;
    }
    true
}
