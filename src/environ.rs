//! Translation of a request scope into the environment a blocking handler expects.

use crate::input::Input;
use crate::scope::RequestScope;
use std::collections::BTreeMap;
use std::fmt;
use std::io;

/// Log target for lines written to [`ErrorStream`].
///
/// [`ErrorStream`]: struct.ErrorStream.html
pub const ERRORS_TARGET: &str = "blockbridge::errors";

/// Version marker of the blocking interface.
const VERSION: (u8, u8) = (1, 0);

/// The environment of one request as seen by a blocking handler.
///
/// CGI-style variables (`REQUEST_METHOD`, `PATH_INFO`, `HTTP_*`, ...) are
/// available through [`get`], while the body and error stream are typed
/// fields.
///
/// [`get`]: #method.get
pub struct Environ {
    vars: BTreeMap<String, String>,
    url_scheme: String,
    /// The request body.
    pub input: Input,
    /// Stream for the handler's error output.
    pub errors: ErrorStream,
}

impl Environ {
    /// Build the environment for `scope`, reading the body from `input`.
    ///
    /// The scheme defaults to `http` when the scope has none.
    pub fn from_scope(scope: &RequestScope, input: Input) -> Self {
        Environ::translate(scope, input, "http")
    }

    pub(crate) fn translate(scope: &RequestScope, input: Input, default_scheme: &str) -> Self {
        let mut vars = BTreeMap::new();

        vars.insert("REQUEST_METHOD".to_string(), scope.method.as_str().to_string());
        vars.insert("SCRIPT_NAME".to_string(), String::new());
        vars.insert("PATH_INFO".to_string(), scope.path.clone());
        vars.insert("QUERY_STRING".to_string(), latin1(&scope.query_string));
        vars.insert(
            "SERVER_PROTOCOL".to_string(),
            protocol_of(scope.http_version).to_string(),
        );

        for (name, value) in &scope.headers {
            let name = latin1(name).to_ascii_lowercase();
            let value = latin1(value);

            // NB: repeated names overwrite, the last one wins.
            let key = match name.as_str() {
                "content-length" => "CONTENT_LENGTH".to_string(),
                "content-type" => "CONTENT_TYPE".to_string(),
                _ => format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_")),
            };

            vars.insert(key, value);
        }

        if let Some(server) = &scope.server {
            vars.insert("SERVER_NAME".to_string(), server.host.clone());
            vars.insert("SERVER_PORT".to_string(), server.port.to_string());
        }

        if let Some(client) = &scope.client {
            vars.insert("REMOTE_ADDR".to_string(), client.host.clone());
            vars.insert("REMOTE_PORT".to_string(), client.port.to_string());
        }

        let url_scheme = scope
            .scheme
            .clone()
            .unwrap_or_else(|| default_scheme.to_string());

        Environ {
            vars,
            url_scheme,
            input,
            errors: ErrorStream::new(),
        }
    }

    /// Get a CGI-style variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.as_str())
    }

    /// Set a CGI-style variable, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    /// All CGI-style variables, ordered by key.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Path and query of the request, such as `/search?q=rust`.
    pub fn request_uri(&self) -> String {
        let path = self.get("PATH_INFO").unwrap_or("/");
        match self.get("QUERY_STRING") {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        }
    }

    /// Version of the blocking interface, always `(1, 0)`.
    pub fn version(&self) -> (u8, u8) {
        VERSION
    }

    /// Url scheme, `http` or `https`.
    pub fn url_scheme(&self) -> &str {
        &self.url_scheme
    }

    /// The handler may be invoked concurrently from several threads.
    pub fn multithread(&self) -> bool {
        true
    }

    /// The handler may be invoked concurrently from several processes.
    pub fn multiprocess(&self) -> bool {
        true
    }

    /// The handler must not assume it is only ever invoked once.
    pub fn run_once(&self) -> bool {
        false
    }
}

impl fmt::Debug for Environ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environ")
            .field("vars", &self.vars)
            .field("url_scheme", &self.url_scheme)
            .field("input", &self.input)
            .finish()
    }
}

/// Each byte becomes one char, so ascii passes through unchanged and the
/// conversion can't fail.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

fn protocol_of(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "HTTP/0.9",
        http::Version::HTTP_10 => "HTTP/1.0",
        http::Version::HTTP_11 => "HTTP/1.1",
        http::Version::HTTP_2 => "HTTP/2",
        _ => "HTTP/3",
    }
}

/// Error output of a handler, forwarded line by line to the `log` facade.
///
/// Lines are logged at `warn` level with target [`ERRORS_TARGET`].
///
/// [`ERRORS_TARGET`]: constant.ERRORS_TARGET.html
#[derive(Debug, Default)]
pub struct ErrorStream {
    line: Vec<u8>,
}

impl ErrorStream {
    fn new() -> Self {
        ErrorStream { line: vec![] }
    }

    fn emit(&mut self) {
        let line = String::from_utf8_lossy(&self.line);
        warn!(target: ERRORS_TARGET, "{}", line.trim_end_matches(&['\r', '\n'][..]));
        self.line.clear();
    }
}

impl io::Write for ErrorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for b in buf {
            self.line.push(*b);
            if *b == b'\n' {
                self.emit();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.line.is_empty() {
            self.emit();
        }
        Ok(())
    }
}

impl Drop for ErrorStream {
    fn drop(&mut self) {
        if !self.line.is_empty() {
            self.emit();
        }
    }
}
