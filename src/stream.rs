//! Optional `tokio`-driven convenience runtime (feature = "stream") that
//! pumps a [`Parser`] from an `AsyncRead` byte source and delivers decoded
//! messages over an `mpsc` channel, mirroring how the teacher's
//! `client_runtime::UdpRuntime` drives its socket I/O loop behind a
//! `tokio::select!` against a `triggered::Listener` shutdown signal. The
//! synchronous core (`Parser`, `FileParser`) has no dependency on this
//! module or on any async runtime.

use crate::parser::{ParseOutcome, Parser};
use crate::{Error, Result};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{self, Receiver, Sender};

const CHANNEL_CAPACITY: usize = 64;
const PULL_BUF_SIZE: usize = 32 * 1024;

/// Handle returned by [`spawn`]: the channel decoded messages arrive on,
/// paired with the background task's join handle.
pub struct StreamHandle {
    pub messages: Receiver<crate::parser::ParsedMessage>,
    pub task: tokio::task::JoinHandle<Result>,
}

/// Drives `parser` from `source` until the source is exhausted, the
/// shutdown signal fires, or the parser hits a hard (non-transient) error.
/// Transient per-message errors (malformed input, CRC mismatch) are
/// swallowed the same way [`crate::parser::FileParser`] swallows them
/// synchronously; only [`Error::StreamEmpty`] or a propagated decode error
/// on a frame that isn't retryable ends the loop.
pub fn spawn<R>(parser: Parser, source: R, shutdown_signal: triggered::Listener) -> StreamHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (sender, messages) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(run(parser, source, sender, shutdown_signal));
    StreamHandle { messages, task }
}

async fn run<R>(
    mut parser: Parser,
    mut source: R,
    sender: Sender<crate::parser::ParsedMessage>,
    shutdown_signal: triggered::Listener,
) -> Result
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut pull_buf = vec![0u8; PULL_BUF_SIZE];
    let pump = async {
        loop {
            match parser.read()? {
                ParseOutcome::Message(m) => {
                    if sender.send(m).await.is_err() {
                        // Receiver dropped; nothing left to deliver to.
                        return Ok(());
                    }
                }
                ParseOutcome::Filtered(_) | ParseOutcome::Unknown(_) | ParseOutcome::CrcMismatch => {
                    continue;
                }
                ParseOutcome::Incomplete => {
                    let n = source.read(&mut pull_buf).await.map_err(Error::from)?;
                    if n == 0 {
                        return Ok(());
                    }
                    parser.write(&pull_buf[..n]);
                }
            }
        }
    };

    tokio::select! {
        _ = shutdown_signal => Ok(()),
        result = pump => result,
    }
}
