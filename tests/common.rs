#![allow(dead_code)]

use blockbridge::dispatch::ThreadPerRequest;
use blockbridge::message::{Inbound, Outbound, ResponseBody, ResponseStart};
use blockbridge::{Adapter, Error, Handler, RequestScope};
use futures_util::sink::Sink;
use futures_util::stream;
use std::io;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("blockbridge", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

pub type Chunks = stream::Iter<std::vec::IntoIter<io::Result<Inbound>>>;

/// Inbound stream delivering the given chunks, then ending.
pub fn chunks(parts: &[(&[u8], bool)]) -> Chunks {
    let v: Vec<io::Result<Inbound>> = parts
        .iter()
        .map(|(body, more)| Ok(Inbound::chunk(*body, *more)))
        .collect();
    stream::iter(v)
}

/// Inbound stream delivering the given messages, then ending.
pub fn messages(msgs: Vec<io::Result<Inbound>>) -> Chunks {
    stream::iter(msgs)
}

/// Outbound sink remembering everything sent.
#[derive(Debug, Default)]
pub struct Recorder {
    pub sent: Vec<Outbound>,
    pub fail: bool,
}

impl Recorder {
    pub fn failing() -> Self {
        Recorder {
            sent: vec![],
            fail: true,
        }
    }

    pub fn start(&self, idx: usize) -> &ResponseStart {
        match &self.sent[idx] {
            Outbound::Start(s) => s,
            m => panic!("Expected start at {}, got: {:?}", idx, m),
        }
    }

    pub fn body(&self, idx: usize) -> &ResponseBody {
        match &self.sent[idx] {
            Outbound::Body(b) => b,
            m => panic!("Expected body at {}, got: {:?}", idx, m),
        }
    }

    /// Asserts the exact start-then-body shape of a successful response.
    pub fn assert_complete(&self) {
        assert_eq!(self.sent.len(), 2, "sent: {:?}", self.sent);
        self.start(0);
        assert!(!self.body(1).more_body);
    }
}

impl Sink<Outbound> for Recorder {
    type Error = io::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Recorder is closed")).into();
        }
        Ok(()).into()
    }

    fn start_send(self: Pin<&mut Self>, item: Outbound) -> Result<(), Self::Error> {
        self.get_mut().sent.push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Ok(()).into()
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Ok(()).into()
    }
}

/// Run one request through an adapter dispatching to fresh threads.
pub async fn run<H: Handler>(
    handler: H,
    scope: RequestScope,
    mut receive: Chunks,
) -> (Result<(), Error>, Recorder) {
    setup_logger();

    let adapter = Adapter::new(handler, ThreadPerRequest::new());

    let mut send = Recorder::default();

    let res = adapter.call(&scope, &mut receive, &mut send).await;

    (res, send)
}

pub fn post(path: &str) -> RequestScope {
    RequestScope::new(http::Method::POST, path)
}

pub fn get(path: &str) -> RequestScope {
    RequestScope::new(http::Method::GET, path)
}
