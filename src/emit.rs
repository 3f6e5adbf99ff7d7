//! Emits the captured response onto the asynchronous transport.

use crate::message::{Outbound, ResponseBody, ResponseStart};
use crate::response::DEFAULT_STATUS;
use crate::Error;
use futures_util::sink::{Sink, SinkExt};
use http::header::{HeaderName, HeaderValue};
use std::fmt;
use std::io;

/// Emits the response of one request onto the transport.
///
/// Exactly one start message and one body message are sent, start first.
/// Sending a body before any start synthesizes a `200` start without headers.
pub struct Emitter<'a, S> {
    send: &'a mut S,
    sent_start: bool,
    sent_body: bool,
}

impl<'a, S> Emitter<'a, S>
where
    S: Sink<Outbound, Error = io::Error> + Unpin,
{
    /// Create an emitter over the outbound sink of a request.
    pub fn new(send: &'a mut S) -> Self {
        Emitter {
            send,
            sent_start: false,
            sent_body: false,
        }
    }

    /// Whether the start message has been sent.
    pub fn is_started(&self) -> bool {
        self.sent_start
    }

    /// Whether the body message has been sent.
    pub fn is_ended(&self) -> bool {
        self.sent_body
    }

    /// Send the status and headers.
    ///
    /// The status code is the leading integer token of `status`. Nothing is
    /// sent if that token, or a header, is invalid.
    pub async fn send_start(&mut self, status: &str, headers: &[(String, String)]) -> Result<(), Error> {
        if self.sent_start {
            return Err(Error::User("Response start already sent".into()));
        }

        let start = response_start(status, headers)?;

        trace!("Send start: {:?}", start);

        // set before sending, a failed send must not be retried.
        self.sent_start = true;

        self.send
            .send(Outbound::Start(start))
            .await
            .map_err(Error::TransportWrite)
    }

    /// Send the entire body, preceded by a default start if none was sent.
    pub async fn send_body(&mut self, body: Vec<u8>) -> Result<(), Error> {
        if self.sent_body {
            return Err(Error::User("Body data is not expected".into()));
        }

        if !self.sent_start {
            trace!("No response start, using default");
            self.send_start(DEFAULT_STATUS, &[]).await?;
        }

        trace!("Send body: {} bytes", body.len());

        self.sent_body = true;

        self.send
            .send(Outbound::Body(ResponseBody {
                body,
                more_body: false,
            }))
            .await
            .map_err(Error::TransportWrite)
    }
}

/// Parse the status code out of a status line such as `"404 Not Found"`.
pub fn parse_status(status: &str) -> Result<http::StatusCode, Error> {
    let malformed = || Error::MalformedStatus(status.to_string());

    let code = status
        .split_whitespace()
        .next()
        .ok_or_else(malformed)?
        .parse::<u16>()
        .map_err(|_| malformed())?;

    http::StatusCode::from_u16(code).map_err(|_| malformed())
}

fn response_start(status: &str, headers: &[(String, String)]) -> Result<ResponseStart, Error> {
    let status = parse_status(status)?;

    let mut out = Vec::with_capacity(headers.len());

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())?;
        let value = HeaderValue::from_bytes(value.as_bytes())?;
        out.push((name, value));
    }

    Ok(ResponseStart {
        status,
        headers: out,
    })
}

impl<'a, S> fmt::Debug for Emitter<'a, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Emitter {{ sent_start: {}, sent_body: {} }}",
            self.sent_start, self.sent_body
        )
    }
}
