//! Typed messages exchanged with the asynchronous transport.

use http::header::{HeaderName, HeaderValue};

/// Message type of a request body chunk.
pub const HTTP_REQUEST: &str = "http.request";
/// Message type signalling the client went away.
pub const HTTP_DISCONNECT: &str = "http.disconnect";
/// Message type of the response status and headers.
pub const HTTP_RESPONSE_START: &str = "http.response.start";
/// Message type of the response body.
pub const HTTP_RESPONSE_BODY: &str = "http.response.body";

/// A message received from the transport for an in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One chunk of request body.
    Request {
        /// Body bytes of this chunk, possibly empty.
        body: Vec<u8>,
        /// Whether more chunks follow this one.
        more_body: bool,
    },
    /// The client disconnected.
    Disconnect,
    /// Any other message type, carried by its type tag.
    Other(String),
}

impl Inbound {
    /// Shorthand for a body chunk.
    pub fn chunk(body: impl Into<Vec<u8>>, more_body: bool) -> Self {
        Inbound::Request {
            body: body.into(),
            more_body,
        }
    }

    /// The message type tag.
    pub fn message_type(&self) -> &str {
        match self {
            Inbound::Request { .. } => HTTP_REQUEST,
            Inbound::Disconnect => HTTP_DISCONNECT,
            Inbound::Other(t) => t,
        }
    }
}

/// A message sent to the transport in response to a request.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Status and headers.
    Start(ResponseStart),
    /// The response body.
    Body(ResponseBody),
}

impl Outbound {
    /// The message type tag.
    pub fn message_type(&self) -> &'static str {
        match self {
            Outbound::Start(_) => HTTP_RESPONSE_START,
            Outbound::Body(_) => HTTP_RESPONSE_BODY,
        }
    }
}

/// Payload of an `http.response.start` message.
#[derive(Debug, Clone)]
pub struct ResponseStart {
    /// Response status.
    pub status: http::StatusCode,
    /// Ordered response headers, names lower-cased.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseStart {
    /// Build the head of an `http::Response` out of this start message.
    ///
    /// Repeated header names are all kept.
    pub fn to_response(&self) -> http::Response<()> {
        let mut res = http::Response::new(());

        *res.status_mut() = self.status;

        let headers = res.headers_mut();
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }

        res
    }
}

/// Payload of an `http.response.body` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    /// Body bytes.
    pub body: Vec<u8>,
    /// Whether more body messages follow. Always `false` from this crate.
    pub more_body: bool,
}
