//! Connection settings for the Ollama server.

use std::time::Duration;

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default timeout for non-streaming requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for [`OllamaClient`](crate::OllamaClient).
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Server address, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Timeout applied to every non-streaming request and to connecting.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_OLLAMA_URL.to_string(), timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl OllamaConfig {
    /// Create a config for the server at `base_url`.
    ///
    /// A bare `host:port` is given an `http://` scheme and a trailing `/` is removed.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: normalize_base_url(&base_url.into()), ..Self::default() }
    }

    /// Create a config from the `OLLAMA_HOST` environment variable, falling
    /// back to [`DEFAULT_OLLAMA_URL`].
    pub fn from_env() -> Self {
        match std::env::var("OLLAMA_HOST") {
            Ok(host) if !host.trim().is_empty() => Self::new(host),
            _ => Self::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") { trimmed.to_string() } else { format!("http://{trimmed}") }
}
