//! Single-owner timers for the manager loop.
//!
//! Each slot holds at most one pending timer of its kind. Arming replaces
//! (and so cancels) whatever was pending; awaiting an empty slot never
//! resolves, which lets the slot sit in a `select!` branch unconditionally.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

/// One-shot deadline (reconnect backoff).
#[derive(Debug, Default)]
pub struct TimerSlot {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration) {
        self.deadline = Some(Box::pin(sleep(delay)));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once when the deadline passes, then the slot is empty again.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}

/// Periodic ticker (drift). The first tick lands one full period after arming.
#[derive(Debug, Default)]
pub struct TickerSlot {
    interval: Option<Interval>,
}

impl TickerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => pending().await,
        }
    }
}
