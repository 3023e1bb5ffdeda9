//! Blocking reader over a host body stream.
//!
//! [`StreamReader`] turns the host's pull-based, callback-completed byte
//! source into a `std::io::Read`. Each pull is paired with a one-shot
//! channel: the host's settle callback sends into it and the reading
//! thread blocks on the receiver until the pull settles.
//!
//! # Terminal state
//!
//! End of stream, a rejected pull, and [`close`](StreamReader::close) are
//! recorded once and reported by every later read without touching the
//! host again.
//!
//! Reads block the calling thread, so they must run outside the async
//! executor. The bridge runs handlers on the blocking pool for that reason.

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use tokio::sync::oneshot;

use crate::error::BodyError;
use crate::host::{HostBodyStream, HostError, PullResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Eof,
    Failed(BodyError),
}

/// A blocking, single-reader view of a host body stream.
pub struct StreamReader {
    stream: Box<dyn HostBodyStream>,
    /// Unread bytes of the last fulfilled pull.
    pending: Bytes,
    terminal: Option<Terminal>,
}

impl StreamReader {
    pub fn new(stream: Box<dyn HostBodyStream>) -> Self {
        Self {
            stream,
            pending: Bytes::new(),
            terminal: None,
        }
    }

    /// Whether end of stream, an error, or closure has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    /// Cancel the host stream and mark the reader closed.
    ///
    /// The cancel outcome is ignored. An existing terminal state is kept, so
    /// a reader that already hit EOF keeps reporting EOF.
    pub fn close(&mut self) {
        self.stream.cancel();
        self.pending.clear();
        if self.terminal.is_none() {
            tracing::debug!("body stream closed before end of stream");
            self.terminal = Some(Terminal::Failed(BodyError::Closed));
        }
    }

    fn terminal_result(terminal: &Terminal) -> io::Result<usize> {
        match terminal {
            Terminal::Eof => Ok(0),
            Terminal::Failed(err) => Err(err.clone().into()),
        }
    }

    /// Issue one pull and block until the host settles it.
    fn pull(&mut self) -> Result<PullResult, HostError> {
        let (tx, rx) = oneshot::channel();
        self.stream.pull(Box::new(move |outcome| {
            // The reader may have gone away; nothing to deliver to then.
            let _ = tx.send(outcome);
        }));
        rx.blocking_recv()
            .unwrap_or_else(|_| Err(HostError::new("body pull was dropped without settling")))
    }

    /// Pull until a non-empty chunk or a terminal outcome arrives.
    fn fill(&mut self) -> Result<(), Terminal> {
        while self.pending.is_empty() {
            match self.pull() {
                Ok(PullResult::Chunk(chunk)) => self.pending = chunk,
                Ok(PullResult::Done) => return Err(Terminal::Eof),
                Err(err) => {
                    return Err(Terminal::Failed(BodyError::Host(err.message().to_string())));
                }
            }
        }
        Ok(())
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(terminal) = &self.terminal {
            return Self::terminal_result(terminal);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if let Err(terminal) = self.fill() {
            tracing::debug!(terminal = ?terminal, "body stream reached terminal state");
            let result = Self::terminal_result(&terminal);
            self.terminal = Some(terminal);
            return result;
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("pending", &self.pending.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}
