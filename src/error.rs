use std::fmt;
use std::io;

/// Possible errors from this crate.
#[derive(Debug)]
pub enum Error {
    /// The inbound message stream failed, disconnected or went away while
    /// more body data was expected.
    TransportRead(io::Error),
    /// The outbound sink refused a response message.
    TransportWrite(io::Error),
    /// The blocking handler returned an error, panicked, or could not be run.
    HandlerExecution(String),
    /// The status line does not start with an integer status code.
    MalformedStatus(String),
    /// A user/usage problem such as emitting a response start twice.
    User(String),
    /// Http errors from the `http` crate.
    Http(http::Error),
}

impl Error {
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Error::TransportRead(e) => e,
            Error::TransportWrite(e) => e,
            Error::HandlerExecution(e) => io::Error::new(io::ErrorKind::Other, e),
            Error::MalformedStatus(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            Error::User(e) => io::Error::new(io::ErrorKind::Other, e),
            Error::Http(e) => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }

    /// Copy of this error. `io::Error` is not `Clone`, the copy keeps kind
    /// and message.
    pub(crate) fn duplicate(&self) -> Error {
        fn io_copy(e: &io::Error) -> io::Error {
            io::Error::new(e.kind(), e.to_string())
        }
        match self {
            Error::TransportRead(e) => Error::TransportRead(io_copy(e)),
            Error::TransportWrite(e) => Error::TransportWrite(io_copy(e)),
            Error::HandlerExecution(e) => Error::HandlerExecution(e.clone()),
            Error::MalformedStatus(e) => Error::MalformedStatus(e.clone()),
            Error::User(e) => Error::User(e.clone()),
            Error::Http(e) => Error::User(format!("http api: {}", e)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TransportRead(v) => write!(f, "transport read: {}", v),
            Error::TransportWrite(v) => write!(f, "transport write: {}", v),
            Error::HandlerExecution(v) => write!(f, "handler execution: {}", v),
            Error::MalformedStatus(v) => write!(f, "malformed status: {:?}", v),
            Error::User(v) => write!(f, "{}", v),
            Error::Http(v) => write!(f, "http api: {}", v),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TransportRead(v) | Error::TransportWrite(v) => Some(v),
            Error::Http(v) => Some(v),
            _ => None,
        }
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(e: http::header::InvalidHeaderName) -> Self {
        Error::Http(e.into())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Error::Http(e.into())
    }
}
