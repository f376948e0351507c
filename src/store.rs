//! In-memory table of bays, keyed by id and kept in snapshot order.

use std::collections::{BTreeSet, HashMap};

use crate::model::{Slot, SlotDelta};

/// Outcome of a delta batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    /// Deltas whose id is not in the store (deltas never create slots)
    pub discarded: usize,
}

#[derive(Debug, Default, Clone)]
pub struct SlotStore {
    slots: Vec<Slot>,
    // id -> position in `slots`
    index: HashMap<String, usize>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Slot> {
        self.index.get(id).map(|&i| &self.slots[i])
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn on_floor(&self, floor: i64) -> Vec<Slot> {
        self.slots
            .iter()
            .filter(|s| s.floor == floor)
            .cloned()
            .collect()
    }

    /// Distinct floors, ascending.
    pub fn floors(&self) -> Vec<i64> {
        self.slots
            .iter()
            .map(|s| s.floor)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Replace the whole table. Ids missing from `snapshot` are gone afterwards.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Slot>) {
        self.slots.clear();
        self.index.clear();

        for slot in snapshot {
            match self.index.get(&slot.id) {
                // Duplicate id inside one snapshot: last one wins, first position kept
                Some(&i) => self.slots[i] = slot,
                None => {
                    self.index.insert(slot.id.clone(), self.slots.len());
                    self.slots.push(slot);
                }
            }
        }
    }

    /// Merge partial records onto existing slots.
    ///
    /// Only the fields present in a delta are written. `last_updated` takes the
    /// delta's value or `now`. A state change that does not carry a duration
    /// restarts the duration at zero.
    pub fn apply_deltas(&mut self, deltas: Vec<SlotDelta>, now: u64) -> ApplyReport {
        let mut report = ApplyReport::default();

        for delta in deltas {
            let Some(&i) = self.index.get(&delta.id) else {
                report.discarded += 1;
                continue;
            };
            let slot = &mut self.slots[i];

            if let Some(state) = delta.state {
                if state != slot.state && delta.duration.is_none() {
                    slot.duration = 0;
                }
                slot.state = state;
            }
            if let Some(zone) = delta.zone {
                slot.zone = zone;
            }
            if let Some(floor) = delta.floor {
                slot.floor = floor;
            }
            if let Some(duration) = delta.duration {
                slot.duration = duration;
            }
            slot.last_updated = delta.last_updated.unwrap_or(now);
            report.applied += 1;
        }

        report
    }

    /// Drift writes in place; ids and order are left alone.
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Slot> {
        self.slots.iter_mut()
    }
}
