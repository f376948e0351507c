//! Mirror configuration: where to connect and how hard to try.

use std::time::Duration;

use crate::drift::DriftConfig;
pub use crate::network::lifecycle::RetryPolicy;

/// Configuration consumed by [`crate::MirrorClient`].
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// WebSocket endpoint (`ws://` or `wss://`)
    pub endpoint: String,
    /// Reconnect ceiling and backoff (default: 5 retries, 1s base, 30s cap)
    pub retry: RetryPolicy,
    /// Offline drift behaviour (default tick: 60s)
    pub drift: DriftConfig,
    /// Bound on a single handshake (default: 10s)
    pub connect_timeout: Duration,
    /// Status payloads kept for display (default: 10)
    pub history_len: usize,
    /// Buffered ops notifications per subscriber (default: 64)
    pub ops_capacity: usize,
    /// Client command queue depth (default: 32)
    pub command_capacity: usize,
    /// Socket event queue depth (default: 100)
    pub event_capacity: usize,
}

impl MirrorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry: RetryPolicy::default(),
            drift: DriftConfig::default(),
            connect_timeout: Duration::from_secs(10),
            history_len: 10,
            ops_capacity: 64,
            command_capacity: 32,
            event_capacity: 100,
        }
    }

    /// Create a new config builder.
    pub fn builder(endpoint: impl Into<String>) -> MirrorConfigBuilder {
        MirrorConfigBuilder {
            config: Self::new(endpoint),
        }
    }
}

/// Builder pattern for MirrorConfig.
pub struct MirrorConfigBuilder {
    config: MirrorConfig,
}

impl MirrorConfigBuilder {
    /// Automatic retries before giving up.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Backoff base and cap.
    pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.config.retry.base = base;
        self.config.retry.cap = cap;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn drift(mut self, drift: DriftConfig) -> Self {
        self.config.drift = drift;
        self
    }

    /// Shorthand for changing only the drift period.
    pub fn drift_period(mut self, period: Duration) -> Self {
        self.config.drift.tick_period = period;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn history_len(mut self, len: usize) -> Self {
        self.config.history_len = len;
        self
    }

    pub fn ops_capacity(mut self, capacity: usize) -> Self {
        self.config.ops_capacity = capacity;
        self
    }

    pub fn build(self) -> MirrorConfig {
        self.config
    }
}
