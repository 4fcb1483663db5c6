//! Public, transport-agnostic configuration.
//!
//! This type intentionally contains no transport-specific concepts (e.g. MQTT
//! client options). Transport factories interpret it into concrete
//! connection settings.

use std::time::Duration;

/// Default per-attempt wait for a reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry configuration with exponential backoff.
///
/// When set on a [`ServiceConfig`], a call that ends in
/// [`Error::Timeout`](crate::Error::Timeout) is re-issued with a fresh
/// correlation id after a jittered, growing delay.
///
/// # Example
///
/// ```
/// use svcbus::RetryConfig;
/// use std::time::Duration;
///
/// let retry_config = RetryConfig {
///     max_attempts: 5,
///     multiplier: 2.0,
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(10),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt).
    pub max_attempts: u32,

    /// Backoff multiplier applied to the delay after each retry.
    pub multiplier: f32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retry attempts (caps exponential growth).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    /// - `max_attempts`: 3
    /// - `multiplier`: 2.0
    /// - `initial_delay`: 100ms
    /// - `max_delay`: 5s
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 2.0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Node, transport and call configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    // ---
    /// Transport connection URI.
    ///
    /// `None` or `memory://` selects the in-process transport. `mqtt://host:port`
    /// (or `tcp://`) selects the MQTT transport when the `transport_rumqttc`
    /// feature is enabled.
    pub transport_uri: Option<String>,

    /// Broker keep-alive interval in seconds.
    pub keep_alive_secs: Option<u16>,

    /// Name of this node; also the broker client id.
    pub node_name: String,

    /// Default time a client waits for each reply.
    pub request_timeout: Duration,

    /// Optional retry of timed-out calls.
    pub retry_config: Option<RetryConfig>,
}

impl ServiceConfig {
    /// Configuration for a broker-backed transport.
    pub fn with_broker(transport_uri: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            transport_uri: Some(transport_uri.into()),
            ..Self::memory(node_name)
        }
    }

    /// Configuration for the in-memory transport.
    pub fn memory(node_name: impl Into<String>) -> Self {
        Self {
            transport_uri: None,
            keep_alive_secs: None,
            node_name: node_name.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_config: None,
        }
    }

    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = Some(secs);
        self
    }

    /// Retry timed-out calls with exponential backoff.
    ///
    /// ```
    /// use svcbus::{RetryConfig, ServiceConfig};
    ///
    /// let config = ServiceConfig::with_broker("mqtt://localhost:1883", "client")
    ///     .with_retry(RetryConfig::default());
    /// assert!(config.retry_config.is_some());
    /// ```
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Set the default per-attempt reply timeout.
    ///
    /// With retry enabled the worst-case call duration is
    /// `request_timeout × (max_attempts + 1)` plus backoff delays.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
