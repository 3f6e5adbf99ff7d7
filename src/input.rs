//! Pull-based request body reader.
//!
//! The handler runs on a worker thread and reads the body through [`Input`].
//! Each time `Input` runs out of buffered bytes it hands a pull request to the
//! asynchronous side and parks the worker on a oneshot created for that one
//! pull. The asynchronous side awaits the next inbound message, resolves the
//! oneshot, and the worker continues.
//!
//! ```text
//!   worker (blocking)                 scheduler (async)
//!   -----------------                 -----------------
//!   Input::read_bytes(n)
//!     Pull(oneshot tx)  ---------->   BodyPump::serve()
//!     block_on(oneshot rx)              receive.next().await
//!                       <----------     tx.send(Pulled)
//!     buffer chunk
//! ```
//!
//! A failed pull is answered to the worker with a copy of the error. The
//! original is kept by the async side, and fails the whole request when the
//! handler returns, whatever the handler made of it.
//!
//! [`Input`]: struct.Input.html

use crate::message::Inbound;
use crate::{err_closed, Error};
use futures_channel::{mpsc, oneshot};
use futures_executor::block_on;
use futures_util::stream::{Stream, StreamExt};
use std::fmt;
use std::io;
use std::mem;

/// A single request for more body, sent from the worker to the async side.
pub(crate) struct Pull(oneshot::Sender<Result<Pulled, Error>>);

/// Outcome of one pull.
#[derive(Debug)]
pub(crate) enum Pulled {
    /// A body chunk and its `more_body` flag.
    Chunk(Vec<u8>, bool),
    /// The inbound stream ended, which counts as end of body.
    Exhausted,
    /// A non-body message was skipped.
    Skipped,
}

pub(crate) type PullSender = mpsc::UnboundedSender<Pull>;
pub(crate) type PullReceiver = mpsc::UnboundedReceiver<Pull>;

pub(crate) fn pull_channel() -> (PullSender, PullReceiver) {
    mpsc::unbounded()
}

/// The async end of one request's body. Answers pulls and remembers the
/// first read failure, which aborts the request once the handler is done.
#[derive(Debug)]
pub(crate) struct BodyPump {
    strict: bool,
    limit: Option<u64>,
    total: u64,
    failure: Option<Error>,
}

impl BodyPump {
    pub(crate) fn new(strict: bool, limit: Option<u64>) -> Self {
        BodyPump {
            strict,
            limit,
            total: 0,
            failure: None,
        }
    }

    /// Answer one pull by awaiting the next inbound message.
    pub(crate) async fn serve<R>(&mut self, pull: Pull, receive: &mut R)
    where
        R: Stream<Item = io::Result<Inbound>> + Unpin,
    {
        let res = if let Some(e) = &self.failure {
            // the reader already saw this, don't touch the transport again.
            Err(e.duplicate())
        } else {
            self.next_checked(receive).await
        };

        let res = match res {
            Err(e) if self.failure.is_none() => {
                // the worker gets a copy, the original aborts the request.
                let copy = e.duplicate();
                self.failure = Some(e);
                Err(copy)
            }
            res => res,
        };

        if pull.0.send(res).is_err() {
            // The Input was dropped while we awaited the transport.
            debug!("Pull answered after reader went away");
        }
    }

    pub(crate) fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    async fn next_checked<R>(&mut self, receive: &mut R) -> Result<Pulled, Error>
    where
        R: Stream<Item = io::Result<Inbound>> + Unpin,
    {
        let pulled = next_pulled(receive, self.strict).await?;

        if let Pulled::Chunk(chunk, _) = &pulled {
            self.total += chunk.len() as u64;

            if let Some(limit) = self.limit {
                if self.total > limit {
                    debug!("Request body passed limit after {} bytes", self.total);
                    return Err(Error::User(format!(
                        "Request body exceeds limit of {} bytes",
                        limit
                    )));
                }
            }
        }

        Ok(pulled)
    }
}

async fn next_pulled<R>(receive: &mut R, strict: bool) -> Result<Pulled, Error>
where
    R: Stream<Item = io::Result<Inbound>> + Unpin,
{
    match receive.next().await {
        None => {
            trace!("Inbound stream ended");
            Ok(Pulled::Exhausted)
        }

        Some(Err(e)) => Err(Error::TransportRead(e)),

        Some(Ok(Inbound::Request { body, more_body })) => {
            trace!("Received chunk: {} bytes, more_body: {}", body.len(), more_body);
            Ok(Pulled::Chunk(body, more_body))
        }

        Some(Ok(Inbound::Disconnect)) => {
            debug!("Client disconnected while reading body");
            Err(Error::TransportRead(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "Client disconnected before end of body",
            )))
        }

        Some(Ok(Inbound::Other(kind))) => {
            if strict {
                warn!("Unexpected message while reading body: {}", kind);
                Err(Error::TransportRead(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Unexpected message type while reading body: {}", kind),
                )))
            } else {
                debug!("Skipping message while reading body: {}", kind);
                Ok(Pulled::Skipped)
            }
        }
    }
}

/// Reads the request body from inside a blocking handler.
///
/// Reads block the calling thread until enough data has arrived, or the body
/// ended. They must therefore never be called from the thread that drives
/// the asynchronous side of the same request.
pub struct Input {
    pull_tx: Option<PullSender>,
    buf: Vec<u8>,
    eof: bool,
    broken: bool,
    total: u64,
}

impl Input {
    pub(crate) fn new(pull_tx: PullSender) -> Self {
        Input {
            pull_tx: Some(pull_tx),
            buf: vec![],
            eof: false,
            broken: false,
            total: 0,
        }
    }

    /// An input that has no body at all.
    pub fn empty() -> Self {
        Input::from_bytes(vec![])
    }

    /// An input with an already complete body.
    ///
    /// Useful for calling handlers outside of the adapter.
    pub fn from_bytes(body: impl Into<Vec<u8>>) -> Self {
        let buf = body.into();
        Input {
            pull_tx: None,
            total: buf.len() as u64,
            buf,
            eof: true,
            broken: false,
        }
    }

    /// Tells whether the end of the body has been reached and all of it
    /// has been read.
    pub fn is_end(&self) -> bool {
        self.eof && self.buf.is_empty()
    }

    /// Read up to `n` bytes.
    ///
    /// Blocks until `n` bytes are available, or the body ends. Less than `n`
    /// bytes are only returned at the end of the body. `n == 0` returns
    /// immediately without touching the transport.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        if n == 0 {
            return Ok(vec![]);
        }

        while self.buf.len() < n && !self.eof {
            self.receive_more()?;
        }

        let max = n.min(self.buf.len());
        let rest = self.buf.split_off(max);

        Ok(mem::replace(&mut self.buf, rest))
    }

    /// Read all remaining body bytes.
    ///
    /// A second call returns an empty vec.
    pub fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        while !self.eof {
            self.receive_more()?;
        }

        Ok(mem::take(&mut self.buf))
    }

    /// Read up to and including the next `\n`, or to end of body.
    pub fn read_line(&mut self) -> Result<Vec<u8>, Error> {
        let mut scanned = 0;

        loop {
            if let Some(i) = self.buf[scanned..].iter().position(|b| *b == b'\n') {
                let rest = self.buf.split_off(scanned + i + 1);
                return Ok(mem::replace(&mut self.buf, rest));
            }

            if self.eof {
                return Ok(mem::take(&mut self.buf));
            }

            scanned = self.buf.len();

            self.receive_more()?;
        }
    }

    /// Hand one pull to the async side and wait for its answer.
    fn receive_more(&mut self) -> Result<(), Error> {
        if self.broken {
            return Err(Error::TransportRead(io::Error::new(
                io::ErrorKind::Other,
                "Body stream failed in an earlier read",
            )));
        }

        if self.eof {
            return Ok(());
        }

        let pull_tx = match &self.pull_tx {
            Some(v) => v,
            None => {
                self.eof = true;
                return Ok(());
            }
        };

        let (tx, rx) = oneshot::channel();

        let res = if pull_tx.unbounded_send(Pull(tx)).is_err() {
            // async side of the request is gone.
            err_closed()
        } else {
            match block_on(rx) {
                Ok(v) => v,
                // Pull was dropped without an answer.
                Err(_) => err_closed(),
            }
        };

        let pulled = match res {
            Ok(v) => v,
            Err(e) => {
                debug!("Body read failed: {}", e);
                self.broken = true;
                self.pull_tx = None;
                return Err(e);
            }
        };

        match pulled {
            Pulled::Chunk(mut chunk, more_body) => {
                self.total += chunk.len() as u64;
                self.buf.append(&mut chunk);

                if !more_body {
                    self.set_eof();
                }
            }

            Pulled::Exhausted => self.set_eof(),

            Pulled::Skipped => {}
        }

        Ok(())
    }

    fn set_eof(&mut self) {
        trace!("End of body after {} bytes", self.total);
        self.eof = true;
        // release the channel, no more pulls will be made.
        self.pull_tx = None;
    }
}

impl io::Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.buf.is_empty() && !self.eof {
            self.receive_more().map_err(|e| e.into_io())?;
        }

        let max = buf.len().min(self.buf.len());

        buf[0..max].copy_from_slice(&self.buf[0..max]);
        self.buf.drain(0..max);

        Ok(max)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Input {{ buffered: {}, total: {}, eof: {} }}",
            self.buf.len(),
            self.total,
            self.eof
        )
    }
}
