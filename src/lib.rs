pub mod client;
pub mod config;
pub mod drift;
mod error;
pub mod model;
pub mod network;
pub mod normalizer;
pub mod ops;
pub mod store;

pub use client::MirrorClient;
pub use config::{MirrorConfig, RetryPolicy};
pub use drift::{DriftConfig, DriftSimulator};
pub use error::MirrorError;
pub use model::{Slot, SlotDelta, SlotState};
pub use network::{ConnectionStatus, Session};
pub use normalizer::{ExtractionStrategy, Normalizer};
pub use ops::{OpsEvent, StatusEntry};
pub use store::SlotStore;
