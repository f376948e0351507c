//! Per-slot flip probability.

use super::config::DriftConfig;
use crate::model::{Slot, SlotState};

/// Chance that `slot` changes state on the next tick, clamped to `[0, 1]`.
///
/// Base rate × floor multiplier, then × the long-stay or long-vacant
/// multiplier once the slot has been in its state past the threshold.
pub fn flip_probability(config: &DriftConfig, slot: &Slot) -> f64 {
    let mut p = config.base_probability * config.floor_multiplier(slot.floor);

    match slot.state {
        SlotState::Occupied if slot.duration > config.long_stay_minutes => {
            p *= config.long_stay_multiplier;
        }
        SlotState::Vacant if slot.duration > config.long_vacant_minutes => {
            p *= config.long_vacant_multiplier;
        }
        _ => {}
    }

    p.clamp(0.0, 1.0)
}
