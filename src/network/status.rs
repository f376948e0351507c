//! Connection status as seen by the rest of the crate and by UI bindings.

use serde::Serialize;

/// Where the socket lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No socket. Either never connected, cleanly closed, waiting for a retry,
    /// or out of retries.
    Disconnected,

    /// A socket attempt is in flight.
    Connecting,

    /// Socket open; live frames are flowing.
    Connected,

    /// The transport reported a failure. A close normally follows and decides
    /// whether to retry.
    Error,
}

impl ConnectionStatus {
    /// Live frames own the store; drift only runs otherwise.
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// A socket exists (or is being opened).
    #[inline]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
