//! Socket lifecycle: status, backoff, timers, the socket task and the
//! manager loop that ties them together.

pub mod connection;
pub mod lifecycle;
pub mod manager;
pub mod status;
pub mod timer;

pub use lifecycle::{CloseKind, CloseOutcome, Lifecycle, RetryPolicy, Session};
pub use manager::ConnectionManager;
pub use status::ConnectionStatus;
