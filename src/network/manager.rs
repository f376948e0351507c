//! The connection manager: one task that owns the socket, both timers and
//! every write to the slot store.
//!
//! Socket events, client commands, the retry deadline and the drift ticker
//! are all branches of a single `select!`, so each handler runs to completion
//! before the next one starts and drift can never interleave with a live
//! batch.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, info, trace, warn};
use url::Url;

use super::connection::{SocketEvent, SocketHandle, TransportEvent};
use super::lifecycle::{CloseKind, CloseOutcome, Lifecycle, Session};
use super::timer::{TickerSlot, TimerSlot};
use crate::config::MirrorConfig;
use crate::drift::DriftSimulator;
use crate::error::MirrorError;
use crate::model::now_ms;
use crate::normalizer::{Normalizer, StoreMutation};
use crate::ops::{OpsEvent, OpsLog};
use crate::store::SlotStore;

/// Requests from the client facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Shutdown,
}

/// Where the manager publishes what it does.
pub struct Outlets {
    pub store: Arc<RwLock<SlotStore>>,
    pub history: Arc<RwLock<OpsLog>>,
    pub session: watch::Sender<Session>,
    pub ops: broadcast::Sender<OpsEvent>,
}

pub struct ConnectionManager {
    url: Url,
    config: MirrorConfig,
    lifecycle: Lifecycle,
    normalizer: Normalizer,
    drift: DriftSimulator,
    socket: Option<SocketHandle>,
    next_session: u64,
    retry_timer: TimerSlot,
    drift_ticker: TickerSlot,
    event_sender: mpsc::Sender<SocketEvent>,
    event_receiver: mpsc::Receiver<SocketEvent>,
    command_receiver: mpsc::Receiver<Command>,
    outlets: Outlets,
}

/// Only `ws://` and `wss://` endpoints are accepted.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, MirrorError> {
    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(MirrorError::ConnectionError(format!(
            "unsupported scheme '{}', expected ws or wss",
            other
        ))),
    }
}

impl ConnectionManager {
    pub fn new(
        config: MirrorConfig,
        outlets: Outlets,
        command_receiver: mpsc::Receiver<Command>,
    ) -> Result<Self, MirrorError> {
        let url = parse_endpoint(&config.endpoint)?;
        let (event_sender, event_receiver) = mpsc::channel(config.event_capacity.max(1));

        Ok(Self {
            url,
            lifecycle: Lifecycle::new(config.retry),
            normalizer: Normalizer::new(),
            drift: DriftSimulator::new(config.drift.clone()),
            socket: None,
            next_session: 0,
            retry_timer: TimerSlot::new(),
            drift_ticker: TickerSlot::new(),
            event_sender,
            event_receiver,
            command_receiver,
            outlets,
            config,
        })
    }

    /// Replace the default normalizer (e.g. one with extra extraction strategies).
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Runs until shutdown is requested or the client goes away.
    pub async fn run(mut self) {
        self.enter_offline();
        self.connect();

        loop {
            tokio::select! {
                biased;

                cmd = self.command_receiver.recv() => {
                    match cmd {
                        Some(Command::Connect) => self.connect(),
                        Some(Command::Shutdown) => {
                            self.teardown();
                            return;
                        }
                        None => {
                            info!("Client command channel closed, Shutting down...");
                            self.teardown();
                            return;
                        }
                    }
                }
                // we hold a sender, so this never yields None
                Some(event) = self.event_receiver.recv() => {
                    self.on_socket_event(event).await;
                }
                _ = self.retry_timer.fired() => {
                    debug!("Retry timer fired (attempt {})", self.lifecycle.attempt());
                    self.connect();
                }
                _ = self.drift_ticker.tick() => {
                    self.drift_tick().await;
                }
            }
        }
    }

    fn connect(&mut self) {
        if !self.lifecycle.begin_connect() {
            debug!("Connect request ignored, socket already {}", self.lifecycle.status());
            return;
        }

        // at most one pending retry and one live socket
        self.retry_timer.disarm();
        if let Some(old) = self.socket.take() {
            old.close();
        }

        self.next_session += 1;
        self.socket = Some(SocketHandle::spawn(
            self.next_session,
            self.url.clone(),
            self.config.connect_timeout,
            self.event_sender.clone(),
        ));
        self.publish_session();
    }

    async fn on_socket_event(&mut self, event: SocketEvent) {
        let current = self.socket.as_ref().map(SocketHandle::session);
        if current != Some(event.session) {
            trace!("Dropping event from stale socket #{}", event.session);
            return;
        }

        match event.event {
            TransportEvent::Opened => {
                info!("Connected to {}", self.url);
                self.lifecycle.on_open();
                // live feed owns the store from here on
                self.drift_ticker.disarm();
                self.publish_session();
            }
            TransportEvent::Frame(raw) => self.on_frame(&raw).await,
            TransportEvent::Failed(reason) => {
                warn!("Transport failure: {}", reason);
                self.lifecycle.on_failure();
                self.publish_session();
            }
            TransportEvent::Closed(kind) => self.on_close(kind),
        }
    }

    fn on_close(&mut self, kind: CloseKind) {
        self.socket = None;

        match self.lifecycle.on_close(kind) {
            CloseOutcome::Settled => {
                info!("Connection closed cleanly");
            }
            CloseOutcome::Retry { attempt, delay } => {
                warn!(
                    "Connection lost ({:?}), retry {}/{} in {:?}",
                    kind,
                    attempt,
                    self.lifecycle.policy().max_attempts,
                    delay
                );
                self.retry_timer.arm(delay);
                self.broadcast(OpsEvent::RetryScheduled { attempt, delay });
            }
            CloseOutcome::Exhausted { attempts } => {
                warn!(
                    "Giving up after {} retries, waiting for an explicit reconnect",
                    attempts
                );
                self.broadcast(OpsEvent::RetriesExhausted { attempts });
            }
        }

        self.enter_offline();
        self.publish_session();
    }

    async fn on_frame(&mut self, raw: &str) {
        let now = now_ms();

        let dispatch = match self.normalizer.normalize(raw, now) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        trace!("{:?} frame", dispatch.kind);
        self.lifecycle.on_frame(now);
        // timestamp only; not worth waking status watchers
        self.outlets.session.send_if_modified(|session| {
            session.last_message_at = Some(now);
            false
        });

        if let Some(mutation) = dispatch.mutation {
            self.apply(mutation, now).await;
        }
        if let Some(notice) = dispatch.notice {
            self.notify(notice, now).await;
        }
    }

    /// One lock acquisition per batch; readers see all of it or none of it.
    async fn apply(&self, mutation: StoreMutation, now: u64) {
        let mut store = self.outlets.store.write().await;

        match mutation {
            StoreMutation::Snapshot(slots) => {
                let count = slots.len();
                store.apply_snapshot(slots);
                debug!("Applied snapshot of {} slots", count);
            }
            StoreMutation::Deltas(batch) => {
                let report = store.apply_deltas(batch.deltas, now);
                debug!(
                    "Applied {} deltas ({} reported, {} for unknown slots)",
                    report.applied, batch.count, report.discarded
                );
            }
        }
    }

    async fn drift_tick(&mut self) {
        if self.lifecycle.status().is_live() {
            self.drift_ticker.disarm();
            return;
        }

        let store = Arc::clone(&self.outlets.store);
        let mut store = store.write().await;
        let report = self.drift.tick(&mut store, now_ms());
        if report.flipped > 0 {
            debug!("Drift flipped {} of {} slots", report.flipped, store.len());
        }
    }

    /// Start drifting unless it is already running.
    fn enter_offline(&mut self) {
        if !self.drift_ticker.is_armed() {
            self.drift_ticker.arm(self.drift.config().tick_period);
        }
    }

    fn teardown(&mut self) {
        self.retry_timer.disarm();
        self.drift_ticker.disarm();
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.lifecycle.on_teardown();
        self.publish_session();
    }

    fn publish_session(&mut self) {
        let session = self.lifecycle.session();
        let previous = self.outlets.session.borrow().status;

        self.outlets.session.send_if_modified(|current| {
            let changed = *current != session;
            *current = session;
            changed
        });

        if previous != session.status {
            debug!("Status {} -> {}", previous, session.status);
            self.broadcast(OpsEvent::StatusChanged(session.status));
        }
    }

    async fn notify(&self, event: OpsEvent, now: u64) {
        if event.status_payload().is_some() {
            self.outlets.history.write().await.record(&event, now);
        }
        self.broadcast(event);
    }

    fn broadcast(&self, event: OpsEvent) {
        // no subscribers is fine
        let _ = self.outlets.ops.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_scheme_is_checked() {
        assert!(parse_endpoint("ws://localhost:8080/ws").is_ok());
        assert!(parse_endpoint("wss://bays.example/live").is_ok());
        assert!(matches!(
            parse_endpoint("http://bays.example"),
            Err(MirrorError::ConnectionError(_))
        ));
        assert!(matches!(
            parse_endpoint("not a url"),
            Err(MirrorError::UrlParseError(_))
        ));
    }
}
