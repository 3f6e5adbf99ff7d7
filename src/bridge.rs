//! Runs a blocking handler underneath the asynchronous transport.
//!
//! # Example
//!
//! ```rust, no_run
//! use blockbridge::{Adapter, BoxError, Environ, RequestScope, StartResponse};
//! use blockbridge::dispatch::WorkerPool;
//! use blockbridge::message::{Inbound, Outbound};
//! use futures_channel::mpsc;
//! use futures_util::sink::SinkExt;
//! use std::io;
//!
//! fn hello(env: &mut Environ, start: &mut StartResponse) -> Result<Vec<Vec<u8>>, BoxError> {
//!     let body = env.input.read_all()?;
//!     start.start("200 OK", vec![("Content-Type", "text/plain")], None);
//!     Ok(vec![b"got ".to_vec(), body])
//! }
//!
//! # async fn run() -> Result<(), blockbridge::Error> {
//! let adapter = Adapter::new(hello, WorkerPool::new(4).unwrap());
//!
//! let (in_tx, mut receive) = mpsc::unbounded::<io::Result<Inbound>>();
//! let (out_tx, _out_rx) = mpsc::unbounded::<Outbound>();
//! let mut send = out_tx.sink_map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e));
//!
//! in_tx.unbounded_send(Ok(Inbound::chunk(&b"ping"[..], false))).unwrap();
//!
//! let scope = RequestScope::new(http::Method::POST, "/hello");
//! adapter.call(&scope, &mut receive, &mut send).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::dispatch::{Dispatch, Job};
use crate::emit::Emitter;
use crate::environ::Environ;
use crate::input::{pull_channel, BodyPump, Input, PullReceiver};
use crate::message::{Inbound, Outbound};
use crate::response::StartResponse;
use crate::scope::RequestScope;
use crate::{BoxError, Error};
use futures_channel::oneshot;
use futures_util::future::{self, Either};
use futures_util::sink::Sink;
use futures_util::stream::{Stream, StreamExt};
use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Body segments returned by a handler, sent in order.
pub type Body = Vec<Vec<u8>>;

/// A blocking request handler.
///
/// The handler reads the request from `environ`, reports status and headers
/// through `start_response` and returns the body. Implemented for any
/// matching closure or function.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request. Called on a worker thread, free to block.
    fn call(&self, environ: &mut Environ, start_response: &mut StartResponse) -> Result<Body, BoxError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Environ, &mut StartResponse) -> Result<Body, BoxError> + Send + Sync + 'static,
{
    fn call(&self, environ: &mut Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
        self(environ, start_response)
    }
}

/// Progress of one request through the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Translating,
    Executing,
    Capturing,
    EmittingStart,
    EmittingBody,
    Done,
    Failed,
}

impl Phase {
    fn advance(&mut self, next: Phase) {
        trace!("Phase {:?} -> {:?}", self, next);
        *self = next;
    }
}

type Completion = (Result<Body, String>, StartResponse);

/// Adapts a blocking [`Handler`] to the asynchronous transport.
///
/// One adapter serves any number of concurrent requests. Each call to
/// [`call`] owns its own environment, body reader and response capture;
/// only the handler and the [`Dispatch`] are shared.
///
/// [`Handler`]: trait.Handler.html
/// [`call`]: #method.call
/// [`Dispatch`]: ../dispatch/trait.Dispatch.html
pub struct Adapter<H, D> {
    handler: Arc<H>,
    dispatch: D,
    config: Config,
}

impl<H, D> Adapter<H, D>
where
    H: Handler,
    D: Dispatch,
{
    /// Create an adapter with default config.
    pub fn new(handler: H, dispatch: D) -> Self {
        Adapter::with_config(handler, dispatch, Config::default())
    }

    /// Create an adapter with the given config.
    pub fn with_config(handler: H, dispatch: D, config: Config) -> Self {
        Adapter {
            handler: Arc::new(handler),
            dispatch,
            config,
        }
    }

    /// The config in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle one request.
    ///
    /// `receive` yields the inbound messages of this request and `send`
    /// accepts its response messages. Scopes that aren't `http` are ignored.
    ///
    /// On success exactly one start and one body message have been sent.
    /// On error, nothing more is sent; whatever was already sent stays sent.
    pub async fn call<R, S>(&self, scope: &RequestScope, receive: &mut R, send: &mut S) -> Result<(), Error>
    where
        R: Stream<Item = io::Result<Inbound>> + Unpin,
        S: Sink<Outbound, Error = io::Error> + Unpin,
    {
        if !scope.is_http() {
            debug!("Ignoring scope: {:?}", scope.kind);
            return Ok(());
        }

        let mut phase = Phase::Idle;

        let res = self.drive(scope, receive, send, &mut phase).await;

        if let Err(e) = &res {
            debug!("{} {} failed in {:?}: {}", scope.method, scope.path, phase, e);
            phase.advance(Phase::Failed);
        }

        res
    }

    async fn drive<R, S>(
        &self,
        scope: &RequestScope,
        receive: &mut R,
        send: &mut S,
        phase: &mut Phase,
    ) -> Result<(), Error>
    where
        R: Stream<Item = io::Result<Inbound>> + Unpin,
        S: Sink<Outbound, Error = io::Error> + Unpin,
    {
        phase.advance(Phase::Translating);

        let (pull_tx, mut pull_rx) = pull_channel();
        let input = Input::new(pull_tx);
        let environ = Environ::translate(scope, input, &self.config.default_scheme);

        phase.advance(Phase::Executing);

        let (done_tx, done_rx) = oneshot::channel();

        let job = handler_job(self.handler.clone(), environ, done_tx);

        self.dispatch
            .dispatch(job)
            .map_err(|e| Error::HandlerExecution(format!("Failed to dispatch handler: {}", e)))?;

        let mut pump = BodyPump::new(self.config.strict_messages, self.config.max_body_size);

        let (result, start_response) = self
            .await_handler(done_rx, &mut pull_rx, &mut pump, receive)
            .await?;

        // a failed body read aborts the request, whatever the handler returned.
        if let Some(e) = pump.take_failure() {
            warn!("Body read failed, nothing is emitted: {}", e);
            return Err(e);
        }

        phase.advance(Phase::Capturing);

        let segments = result.map_err(|e| {
            warn!("Handler failed: {}", e);
            Error::HandlerExecution(e)
        })?;

        let state = start_response.take_state();

        if let Some(e) = &state.exc_info {
            debug!("Handler reported error in response: {}", e);
        }

        // returned segments first, then what was pushed through the writer.
        let mut body = segments.concat();
        for mut segment in state.body {
            body.append(&mut segment);
        }

        debug!(
            "{} {} -> {:?} ({} body bytes)",
            scope.method,
            scope.path,
            state.status,
            body.len()
        );

        let mut emitter = Emitter::new(send);

        phase.advance(Phase::EmittingStart);

        if state.started {
            emitter.send_start(&state.status, &state.headers).await?;
        }

        phase.advance(Phase::EmittingBody);

        emitter.send_body(body).await?;

        phase.advance(Phase::Done);

        Ok(())
    }

    /// Await handler completion, serving its body pulls in the meantime.
    async fn await_handler<R>(
        &self,
        mut done_rx: oneshot::Receiver<Completion>,
        pull_rx: &mut PullReceiver,
        pump: &mut BodyPump,
        receive: &mut R,
    ) -> Result<Completion, Error>
    where
        R: Stream<Item = io::Result<Inbound>> + Unpin,
    {
        let done = loop {
            match future::select(pull_rx.next(), &mut done_rx).await {
                Either::Left((Some(pull), _)) => {
                    pump.serve(pull, receive).await;
                }

                Either::Left((None, done_fut)) => {
                    // body reader is gone, only completion is left.
                    break done_fut.await;
                }

                Either::Right((done, _)) => break done,
            }
        };

        done.map_err(|_| Error::HandlerExecution("Handler job dropped before completing".into()))
    }
}

/// The job handed to the dispatch: run the handler and report back.
fn handler_job<H: Handler>(
    handler: Arc<H>,
    mut environ: Environ,
    done_tx: oneshot::Sender<Completion>,
) -> Job {
    Box::new(move || {
        let mut start_response = StartResponse::new();

        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            Handler::call(&*handler, &mut environ, &mut start_response)
        }));

        // release the body reader before signalling completion.
        drop(environ);

        let res = match res {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(&*panic)),
        };

        if done_tx.send((res, start_response)).is_err() {
            debug!("Handler completed after request was dropped");
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Handler panicked: {}", s)
    } else {
        "Handler panicked".to_string()
    }
}

impl<H, D> fmt::Debug for Adapter<H, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Adapter {{ config: {:?} }}", self.config)
    }
}
