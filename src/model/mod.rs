pub mod message;
pub mod slot;

pub use message::{Envelope, MessageKind};
pub use slot::{now_ms, Slot, SlotDelta, SlotState};
