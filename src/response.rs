use crate::BoxError;
use std::fmt;
use std::io;
use std::mem;
use std::sync::{Arc, Mutex};

/// Status line used when the handler never starts the response.
pub(crate) const DEFAULT_STATUS: &str = "200 OK";

/// What the handler told us about its response.
pub(crate) struct ResponseState {
    pub status: String,
    pub headers: Vec<(String, String)>,
    /// Segments written through a `BodyWriter`, in order.
    pub body: Vec<Vec<u8>>,
    pub started: bool,
    pub exc_info: Option<BoxError>,
}

impl ResponseState {
    fn new() -> Self {
        ResponseState {
            status: DEFAULT_STATUS.to_string(),
            headers: vec![],
            body: vec![],
            started: false,
            exc_info: None,
        }
    }
}

/// Captures the response status and headers a blocking handler reports.
///
/// This is the blocking side of the response: nothing is sent until the
/// handler returns, so calling [`start`] again simply replaces what was
/// recorded before.
///
/// [`start`]: #method.start
pub struct StartResponse {
    state: Arc<Mutex<ResponseState>>,
}

impl StartResponse {
    /// Create a new, not yet started, response capture.
    pub fn new() -> Self {
        StartResponse {
            state: Arc::new(Mutex::new(ResponseState::new())),
        }
    }

    /// Record status line and headers.
    ///
    /// `status` is a full status line such as `"404 Not Found"`. `exc_info`
    /// is given when a handler replaces an earlier start because of an
    /// error. The returned writer appends body segments after whatever
    /// the handler returns.
    pub fn start<I, K, V>(&mut self, status: &str, headers: I, exc_info: Option<BoxError>) -> BodyWriter
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut lock = self.state.lock().unwrap();

        if let Some(e) = &exc_info {
            debug!("Response restarted with error: {}", e);
        } else if lock.started {
            trace!("Response started again, last call wins");
        }

        lock.status = status.to_string();
        lock.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        lock.started = true;
        if exc_info.is_some() {
            lock.exc_info = exc_info;
        }

        BodyWriter {
            state: self.state.clone(),
        }
    }

    /// Whether `start` has been called.
    pub fn is_started(&self) -> bool {
        self.state.lock().unwrap().started
    }

    /// Currently recorded status line.
    pub fn status(&self) -> String {
        self.state.lock().unwrap().status.clone()
    }

    /// Currently recorded headers.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().headers.clone()
    }

    /// Body bytes written so far through a `BodyWriter`.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().body.concat()
    }

    /// Take out the recorded state, leaving defaults behind.
    pub(crate) fn take_state(&self) -> ResponseState {
        let mut lock = self.state.lock().unwrap();
        mem::replace(&mut *lock, ResponseState::new())
    }
}

impl Default for StartResponse {
    fn default() -> Self {
        StartResponse::new()
    }
}

/// Appends body segments to a captured response.
///
/// Obtained from [`StartResponse::start`]. Cloneable and safe to move to
/// other threads, though segments written after the handler has returned
/// are lost.
///
/// [`StartResponse::start`]: struct.StartResponse.html#method.start
#[derive(Clone)]
pub struct BodyWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl BodyWriter {
    /// Append one body segment.
    pub fn push(&self, segment: impl Into<Vec<u8>>) {
        let segment = segment.into();
        trace!("Body writer segment: {} bytes", segment.len());
        self.state.lock().unwrap().body.push(segment);
    }
}

impl io::Write for BodyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for StartResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = self.state.lock().unwrap();
        write!(f, "StartResponse {{ status: {:?}, started: {} }}", lock.status, lock.started)
    }
}

impl fmt::Debug for BodyWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyWriter")
    }
}
