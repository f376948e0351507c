//! Socket lifecycle state machine and reconnect backoff.
//!
//! ```text
//! disconnected --connect--> connecting --open--> connected
//!      ^                        |                    |
//!      +------ close -----------+--------------------+
//! any --transport failure--> error   (the close that follows decides retry)
//! ```
//!
//! The retry `attempt` counter belongs to the lifecycle, not to a socket: it
//! survives across attempts and only a successful open resets it.

use std::time::Duration;

use super::status::ConnectionStatus;

/// Exponential backoff with a ceiling on consecutive retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries before giving up (default: 5)
    pub max_attempts: u32,
    /// Delay before the first retry (default: 1s)
    pub base: Duration,
    /// Upper bound on any single delay (default: 30s)
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt, cap)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// How a socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Normal closure (1000). Never retried.
    Clean,
    /// Anything else; carries the close code when the peer sent one.
    Abnormal(Option<u16>),
}

/// What the manager should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Clean close, nothing scheduled.
    Settled,
    /// Schedule a reconnect after `delay`; `attempt` is the new counter value.
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached. Only an explicit reconnect request goes further.
    Exhausted { attempts: u32 },
}

/// Read-only view of the current connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub status: ConnectionStatus,
    pub attempt: u32,
    /// Epoch millis of the last frame that parsed
    pub last_message_at: Option<u64>,
    /// Auto-retry gave up; waiting for an explicit reconnect
    pub retries_exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    policy: RetryPolicy,
    status: ConnectionStatus,
    attempt: u32,
    last_message_at: Option<u64>,
    exhausted: bool,
}

impl Lifecycle {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            status: ConnectionStatus::Disconnected,
            attempt: 0,
            last_message_at: None,
            exhausted: false,
        }
    }

    #[inline]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn session(&self) -> Session {
        Session {
            status: self.status,
            attempt: self.attempt,
            last_message_at: self.last_message_at,
            retries_exhausted: self.exhausted,
        }
    }

    /// Move to `connecting` unless a socket is already open or opening.
    /// Returns whether a new attempt should be started.
    pub fn begin_connect(&mut self) -> bool {
        if self.status.is_busy() {
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        self.last_message_at = None;
        self.exhausted = false;
        true
    }

    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.attempt = 0;
        self.exhausted = false;
    }

    pub fn on_frame(&mut self, at: u64) {
        self.last_message_at = Some(at);
    }

    /// Transport failure. Retry is decided by the close that follows.
    pub fn on_failure(&mut self) {
        self.status = ConnectionStatus::Error;
    }

    pub fn on_close(&mut self, kind: CloseKind) -> CloseOutcome {
        self.status = ConnectionStatus::Disconnected;

        match kind {
            CloseKind::Clean => CloseOutcome::Settled,
            CloseKind::Abnormal(_) if self.attempt >= self.policy.max_attempts => {
                self.exhausted = true;
                CloseOutcome::Exhausted {
                    attempts: self.attempt,
                }
            }
            CloseKind::Abnormal(_) => {
                let delay = self.policy.delay_for(self.attempt);
                self.attempt += 1;
                CloseOutcome::Retry {
                    attempt: self.attempt,
                    delay,
                }
            }
        }
    }

    /// Component teardown: socket closed by us, nothing scheduled.
    pub fn on_teardown(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..8).map(|a| policy.delay_for(a)).collect();
        assert_eq!(
            delays,
            vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30), secs(30), secs(30)]
        );
        assert_eq!(policy.delay_for(64), secs(30));
    }

    #[test]
    fn test_open_then_abnormal_close_schedules_first_retry() {
        let mut lc = Lifecycle::default();
        assert!(lc.begin_connect());
        lc.on_open();
        assert_eq!(lc.status(), ConnectionStatus::Connected);

        let outcome = lc.on_close(CloseKind::Abnormal(Some(1006)));
        assert_eq!(outcome, CloseOutcome::Retry { attempt: 1, delay: secs(1) });
        assert_eq!(lc.status(), ConnectionStatus::Disconnected);
        assert_eq!(lc.attempt(), 1);
    }

    #[test]
    fn test_sixth_abnormal_close_does_not_retry() {
        let mut lc = Lifecycle::default();
        let mut delays = Vec::new();

        for _ in 0..5 {
            assert!(lc.begin_connect());
            match lc.on_close(CloseKind::Abnormal(None)) {
                CloseOutcome::Retry { delay, .. } => delays.push(delay),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(8), secs(16)]);

        assert!(lc.begin_connect());
        assert_eq!(
            lc.on_close(CloseKind::Abnormal(None)),
            CloseOutcome::Exhausted { attempts: 5 }
        );
        assert!(lc.session().retries_exhausted);
    }

    #[test]
    fn test_clean_close_settles() {
        let mut lc = Lifecycle::default();
        lc.begin_connect();
        lc.on_open();
        assert_eq!(lc.on_close(CloseKind::Clean), CloseOutcome::Settled);
        assert_eq!(lc.attempt(), 0);
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let mut lc = Lifecycle::default();
        lc.begin_connect();
        lc.on_close(CloseKind::Abnormal(None));
        lc.begin_connect();
        lc.on_close(CloseKind::Abnormal(None));
        assert_eq!(lc.attempt(), 2);

        // a connect request alone does not reset
        lc.begin_connect();
        assert_eq!(lc.attempt(), 2);

        lc.on_open();
        assert_eq!(lc.attempt(), 0);
    }

    #[test]
    fn test_connect_while_busy_is_noop() {
        let mut lc = Lifecycle::default();
        assert!(lc.begin_connect());
        assert!(!lc.begin_connect());
        lc.on_open();
        assert!(!lc.begin_connect());
    }

    #[test]
    fn test_failure_then_close() {
        let mut lc = Lifecycle::default();
        lc.begin_connect();
        lc.on_failure();
        assert_eq!(lc.status(), ConnectionStatus::Error);

        // error alone does not end the sequence; the close schedules the retry
        assert!(matches!(
            lc.on_close(CloseKind::Abnormal(None)),
            CloseOutcome::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_frames_stamp_session() {
        let mut lc = Lifecycle::default();
        lc.begin_connect();
        lc.on_open();
        lc.on_frame(1234);
        assert_eq!(lc.session().last_message_at, Some(1234));

        // a new attempt starts a fresh session
        lc.on_close(CloseKind::Clean);
        lc.begin_connect();
        assert_eq!(lc.session().last_message_at, None);
    }
}
