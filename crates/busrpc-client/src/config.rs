//! Stream configuration.

use std::time::Duration;

/// Default bound on the handshake round trip.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time the dispatcher waits on a full receive queue before it
/// gives up on the consumer.
pub const DEFAULT_STUCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delivery group of the response subscription.
pub const DEFAULT_QUEUE_GROUP: &str = "receive";

/// Per-stream settings.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use busrpc_client::StreamConfig;
///
/// let config = StreamConfig::new()
///     .with_handshake_timeout(Duration::from_secs(1))
///     .with_stuck_timeout(Duration::from_secs(10));
/// assert_eq!(config.queue_group(), "receive");
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    handshake_timeout: Duration,
    stuck_timeout: Duration,
    queue_group: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            stuck_timeout: DEFAULT_STUCK_TIMEOUT,
            queue_group: DEFAULT_QUEUE_GROUP.to_string(),
        }
    }

    /// Set the handshake timeout.
    ///
    /// The handshake is also bounded by the stream context's deadline,
    /// whichever is earlier.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the stuck-consumer timeout.
    #[must_use]
    pub const fn with_stuck_timeout(mut self, timeout: Duration) -> Self {
        self.stuck_timeout = timeout;
        self
    }

    /// Set the delivery group of the response subscription.
    #[must_use]
    pub fn with_queue_group(mut self, group: impl Into<String>) -> Self {
        self.queue_group = group.into();
        self
    }

    /// The handshake timeout.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// The stuck-consumer timeout.
    #[must_use]
    pub const fn stuck_timeout(&self) -> Duration {
        self.stuck_timeout
    }

    /// The delivery group of the response subscription.
    #[must_use]
    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }
}
