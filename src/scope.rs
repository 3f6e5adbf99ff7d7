//! The per-request descriptor handed to the adapter by the asynchronous transport.

use std::fmt;

/// Protocol type tag of a scope.
///
/// Only `Http` scopes are handled, anything else is ignored by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// A plain `http` request/response exchange.
    Http,
    /// Any other protocol type, such as `websocket` or `lifespan`.
    Other(String),
}

/// A transport address as `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    /// Host name or textual ip address.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl Addr {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Addr {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Immutable description of one inbound request.
///
/// Created once per request by the transport. The adapter only reads it.
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Protocol type tag.
    pub kind: ScopeKind,
    /// Request method.
    pub method: http::Method,
    /// Request path, without query string.
    pub path: String,
    /// Raw query string bytes, without the leading `?`.
    pub query_string: Vec<u8>,
    /// HTTP version of the request.
    pub http_version: http::Version,
    /// Ordered header name/value pairs. Names are case-insensitive.
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    /// Address of the listening server, if known.
    pub server: Option<Addr>,
    /// Address of the remote client, if known.
    pub client: Option<Addr>,
    /// Url scheme, if known.
    pub scheme: Option<String>,
}

impl RequestScope {
    /// Create an `http` scope for `method` and `path` with no headers and an
    /// empty query string.
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        RequestScope {
            kind: ScopeKind::Http,
            method,
            path: path.into(),
            query_string: vec![],
            http_version: http::Version::HTTP_11,
            headers: vec![],
            server: None,
            client: None,
            scheme: None,
        }
    }

    /// Create an `http` scope from the head of an `http::Request`.
    ///
    /// Every header value is kept, including repeated names, in the order
    /// the `HeaderMap` yields them.
    pub fn from_request<T>(req: &http::Request<T>) -> Self {
        let uri = req.uri();

        let headers = req
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().as_bytes().to_vec(), value.as_bytes().to_vec()))
            .collect();

        RequestScope {
            kind: ScopeKind::Http,
            method: req.method().clone(),
            path: uri.path().to_string(),
            query_string: uri.query().unwrap_or("").as_bytes().to_vec(),
            http_version: req.version(),
            headers,
            server: None,
            client: None,
            scheme: uri.scheme_str().map(|s| s.to_string()),
        }
    }

    /// Tells whether this scope is an `http` scope.
    pub fn is_http(&self) -> bool {
        self.kind == ScopeKind::Http
    }

    /// Set the protocol type tag.
    pub fn with_kind(mut self, kind: ScopeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the raw query string.
    pub fn with_query(mut self, query: impl Into<Vec<u8>>) -> Self {
        self.query_string = query.into();
        self
    }

    /// Set the http version.
    pub fn with_version(mut self, version: http::Version) -> Self {
        self.http_version = version;
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the server address.
    pub fn with_server(mut self, addr: Addr) -> Self {
        self.server = Some(addr);
        self
    }

    /// Set the client address.
    pub fn with_client(mut self, addr: Addr) -> Self {
        self.client = Some(addr);
        self
    }

    /// Set the url scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }
}
