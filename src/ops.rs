//! Notifications for the operational side: status transitions, raw server
//! status payloads, and a short history for display.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;

use crate::network::status::ConnectionStatus;

/// Read-only notification emitted by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum OpsEvent {
    StatusChanged(ConnectionStatus),
    /// Raw `status` payload
    ServerStatus(Value),
    /// Raw `system_status` payload
    SystemStatus(Value),
    Ping(Value),
    /// Raw `error` payload sent by the server
    ServerError(Value),
    RetryScheduled { attempt: u32, delay: Duration },
    RetriesExhausted { attempts: u32 },
}

impl OpsEvent {
    /// History label and payload for the events kept in the [`OpsLog`].
    pub fn status_payload(&self) -> Option<(&'static str, &Value)> {
        match self {
            Self::ServerStatus(v) => Some(("status", v)),
            Self::SystemStatus(v) => Some(("system_status", v)),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatusChanged(status) => write!(f, "connection {}", status),
            Self::ServerStatus(v) => write!(f, "status {}", v),
            Self::SystemStatus(v) => write!(f, "system_status {}", v),
            Self::Ping(_) => write!(f, "ping"),
            Self::ServerError(v) => write!(f, "server error {}", v),
            Self::RetryScheduled { attempt, delay } => {
                write!(f, "retry #{} in {:.1}s", attempt, delay.as_secs_f64())
            }
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} retries", attempts)
            }
        }
    }
}

/// One retained status payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub received_at: u64,
    pub kind: &'static str,
    pub payload: Value,
}

/// Bounded history of status payloads, oldest evicted first.
#[derive(Debug, Clone)]
pub struct OpsLog {
    entries: VecDeque<StatusEntry>,
    capacity: usize,
}

impl OpsLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Keep `event` if it is a status payload. Returns whether it was kept.
    pub fn record(&mut self, event: &OpsEvent, received_at: u64) -> bool {
        let Some((kind, payload)) = event.status_payload() else {
            return false;
        };
        if self.capacity == 0 {
            return false;
        }

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(StatusEntry {
            received_at,
            kind,
            payload: payload.clone(),
        });
        true
    }

    pub fn entries(&self) -> Vec<StatusEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OpsLog {
    fn default() -> Self {
        Self::new(10)
    }
}
