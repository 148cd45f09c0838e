// src/exec/pipe.rs

//! The one pipe a child writes both stdout and stderr into.

use std::io;

use os_pipe::{PipeReader, PipeWriter};
use tokio::io::AsyncRead;
use tokio::process::Command;

/// Create the output pipe. Both ends are close-on-exec, so other children
/// spawned concurrently never inherit them.
pub(crate) fn output_pipe() -> io::Result<(PipeReader, PipeWriter)> {
    os_pipe::pipe()
}

/// Make `writer` the child's stdout and stderr.
///
/// The command keeps the parent's copies of the write end until it is
/// dropped; the reader only sees EOF after that.
pub(crate) fn attach_output(cmd: &mut Command, writer: PipeWriter) -> io::Result<()> {
    let stderr = writer.try_clone()?;
    cmd.stdout(writer).stderr(stderr);
    Ok(())
}

/// Register the read end with the Tokio reactor.
#[cfg(unix)]
pub(crate) fn into_async_reader(
    reader: PipeReader,
    _buffer_size: usize,
) -> io::Result<impl AsyncRead + Unpin + Send + 'static> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe::Receiver;

    Receiver::from_owned_fd(OwnedFd::from(reader))
}

/// Anonymous pipes cannot be polled here, so a plain thread copies the read
/// end into an in-memory duplex stream.
#[cfg(not(unix))]
pub(crate) fn into_async_reader(
    mut reader: PipeReader,
    buffer_size: usize,
) -> io::Result<impl AsyncRead + Unpin + Send + 'static> {
    use std::io::Read;
    use tokio::io::AsyncWriteExt;

    let (mut tx, rx) = tokio::io::duplex(buffer_size);
    let handle = tokio::runtime::Handle::current();
    std::thread::Builder::new()
        .name("procrun-pipe".into())
        .spawn(move || {
            let mut buf = vec![0u8; buffer_size];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if handle.block_on(tx.write_all(&buf[..n])).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;
    Ok(rx)
}
