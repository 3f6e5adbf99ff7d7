/// Adapter configuration.
///
/// ```
/// use blockbridge::Config;
///
/// let config = Config::new()
///     .strict_messages(false)
///     .max_body_size(Some(1024 * 1024));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) strict_messages: bool,
    pub(crate) max_body_size: Option<u64>,
    pub(crate) default_scheme: String,
}

impl Config {
    /// Create a config with default values.
    pub fn new() -> Self {
        Config {
            strict_messages: true,
            max_body_size: None,
            default_scheme: "http".to_string(),
        }
    }

    /// Whether an inbound message that isn't a body chunk, received while the
    /// handler reads the body, fails the read and the request.
    ///
    /// Defaults to `true`. When `false`, such messages are skipped.
    pub fn strict_messages(mut self, strict: bool) -> Self {
        self.strict_messages = strict;
        self
    }

    /// Max number of request body bytes a handler may pull in.
    ///
    /// Going over it fails the read and the request with `Error::User`.
    /// Defaults to `None`, no limit.
    pub fn max_body_size(mut self, max: Option<u64>) -> Self {
        self.max_body_size = max;
        self
    }

    /// Url scheme to use when the request scope doesn't carry one.
    ///
    /// Defaults to `http`.
    pub fn default_scheme(mut self, scheme: &str) -> Self {
        self.default_scheme = scheme.to_string();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
