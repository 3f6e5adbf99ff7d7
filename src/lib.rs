#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]

//! Run blocking request handlers underneath an asynchronous server.
//!
//! An asynchronous server delivers a request as a [`RequestScope`] plus a
//! stream of inbound messages (body chunks), and expects the response back
//! as a sequence of outbound messages. A blocking handler on the other hand
//! is a single call that receives the whole request and returns the whole
//! response. This library connects the two.
//!
//! ## In scope
//!
//! * Translating the request scope into a CGI-style [`Environ`].
//! * Reading the request body lazily from inside the handler, pulling one
//!   chunk at a time from the asynchronous side.
//! * Capturing status, headers and body segments reported by the handler.
//! * Running the handler off the asynchronous scheduler, on a [`Dispatch`]
//!   given by the caller.
//! * Emitting exactly one start and one body message, in that order.
//!
//! ## Out of scope
//!
//! The wire protocol. Parsing HTTP/1.1, TLS, connection pooling, upgrades
//! and multipart bodies all belong to the server driving the adapter.
//!
//! # Layout and API
//!
//! The entry point is [`Adapter::call`], which handles one request from
//! start to end. Its inbound side is any `Stream` of [`Inbound`] messages
//! and its outbound side any `Sink` of [`Outbound`] messages, so the
//! adapter works with whichever async runtime the server uses.
//!
//! The blocking side is the [`Handler`] trait, implemented for closures:
//!
//! ```
//! use blockbridge::{BoxError, Environ, StartResponse};
//!
//! fn echo(env: &mut Environ, start: &mut StartResponse) -> Result<Vec<Vec<u8>>, BoxError> {
//!     let body = env.input.read_all()?;
//!     start.start("200 OK", vec![("content-type", "application/octet-stream")], None);
//!     Ok(vec![body])
//! }
//! # let _ = echo;
//! ```
//!
//! [`RequestScope`]: scope/struct.RequestScope.html
//! [`Environ`]: environ/struct.Environ.html
//! [`Dispatch`]: dispatch/trait.Dispatch.html
//! [`Adapter::call`]: bridge/struct.Adapter.html#method.call
//! [`Inbound`]: message/enum.Inbound.html
//! [`Outbound`]: message/enum.Outbound.html
//! [`Handler`]: bridge/trait.Handler.html

#[macro_use]
extern crate log;

mod config;
mod emit;
mod error;
mod response;

pub mod bridge;
pub mod dispatch;
pub mod environ;
pub mod input;
pub mod message;
pub mod scope;

pub use bridge::{Adapter, Body, Handler};
pub use config::Config;
pub use emit::{parse_status, Emitter};
pub use environ::{Environ, ErrorStream};
pub use error::Error;
pub use input::Input;
pub use response::{BodyWriter, StartResponse};
pub use scope::{Addr, RequestScope, ScopeKind};

/// Error type returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) fn err_closed<T>() -> Result<T, Error> {
    use std::io;
    Err(Error::TransportRead(io::Error::new(
        io::ErrorKind::NotConnected,
        "Connection is closed",
    )))
}
