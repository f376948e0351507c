use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::model::Slot;
use crate::network::manager::{Command, ConnectionManager, Outlets};
use crate::network::{ConnectionStatus, Session};
use crate::normalizer::Normalizer;
use crate::ops::{OpsEvent, OpsLog, StatusEntry};
use crate::store::SlotStore;

pub struct MirrorClient {
    // Channel to send commands to the manager
    command_sender: mpsc::Sender<Command>,

    store: Arc<RwLock<SlotStore>>,
    history: Arc<RwLock<OpsLog>>,
    session: watch::Receiver<Session>,
    ops: broadcast::Sender<OpsEvent>,

    // Taken by shutdown()
    task: Option<JoinHandle<()>>,
}

impl MirrorClient {
    /// Start mirroring `config.endpoint`.
    ///
    /// The manager runs in the background and makes its first connect
    /// attempt straight away; this returns without waiting for it.
    pub async fn connect(config: MirrorConfig) -> Result<Self, MirrorError> {
        Self::connect_with(config, Normalizer::new()).await
    }

    /// Like [`MirrorClient::connect`], with a custom normalizer.
    pub async fn connect_with(
        config: MirrorConfig,
        normalizer: Normalizer,
    ) -> Result<Self, MirrorError> {
        let (command_sender, command_receiver) = mpsc::channel(config.command_capacity.max(1));
        let (session_tx, session_rx) = watch::channel(Session::default());
        let (ops_tx, _) = broadcast::channel(config.ops_capacity.max(1));

        let store = Arc::new(RwLock::new(SlotStore::new()));
        let history = Arc::new(RwLock::new(OpsLog::new(config.history_len)));

        let outlets = Outlets {
            store: Arc::clone(&store),
            history: Arc::clone(&history),
            session: session_tx,
            ops: ops_tx.clone(),
        };

        let manager =
            ConnectionManager::new(config, outlets, command_receiver)?.with_normalizer(normalizer);
        let task = tokio::spawn(manager.run());

        Ok(Self {
            command_sender,
            store,
            history,
            session: session_rx,
            ops: ops_tx,
            task: Some(task),
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.borrow().status
    }

    pub fn session(&self) -> Session {
        *self.session.borrow()
    }

    /// Receiver that wakes on status / attempt changes (not on every frame).
    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.clone()
    }

    /// Operational notifications from now on.
    pub fn subscribe_ops(&self) -> broadcast::Receiver<OpsEvent> {
        self.ops.subscribe()
    }

    /// All slots in store order.
    pub async fn slots(&self) -> Vec<Slot> {
        self.store.read().await.slots().to_vec()
    }

    pub async fn slots_on_floor(&self, floor: i64) -> Vec<Slot> {
        self.store.read().await.on_floor(floor)
    }

    pub async fn slot(&self, id: &str) -> Option<Slot> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn floors(&self) -> Vec<i64> {
        self.store.read().await.floors()
    }

    /// Most recent `status` / `system_status` payloads, oldest first.
    pub async fn status_history(&self) -> Vec<StatusEntry> {
        self.history.read().await.entries()
    }

    /// Ask for a new connection. A no-op while a socket is open or opening;
    /// the only way back after retries are exhausted.
    pub async fn reconnect(&self) -> Result<(), MirrorError> {
        self.send_command(Command::Connect).await
    }

    /// Close the socket cleanly, cancel timers and wait for the manager to stop.
    pub async fn shutdown(mut self) -> Result<(), MirrorError> {
        self.send_command(Command::Shutdown).await?;
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| MirrorError::ConnectionError(e.to_string()))?;
        }
        Ok(())
    }

    async fn send_command(&self, command: Command) -> Result<(), MirrorError> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| MirrorError::ChannelClosed)
    }
}
