//! Offline drift - keeps occupancy plausible while no live feed is present.
//!
//! Each tick ages every slot by one minute and flips a few of them at random.
//! The simulator itself knows nothing about the connection; the connection
//! manager decides when ticks happen.

mod config;
mod policy;

pub use config::{DriftConfig, DriftConfigBuilder};
pub use policy::flip_probability;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::model::Slot;
use crate::store::SlotStore;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub flipped: usize,
    pub aged: usize,
}

pub struct DriftSimulator<R = StdRng> {
    config: DriftConfig,
    rng: R,
}

impl DriftSimulator<StdRng> {
    /// Seeded from `config.seed` when set, from the OS otherwise.
    pub fn new(config: DriftConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }
}

impl<R: Rng> DriftSimulator<R> {
    pub fn with_rng(config: DriftConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Apply one tick to every slot in the store.
    pub fn tick(&mut self, store: &mut SlotStore, now: u64) -> DriftReport {
        let mut report = DriftReport::default();

        for slot in store.iter_mut() {
            if self.step(slot, now) {
                report.flipped += 1;
            } else {
                report.aged += 1;
            }
        }

        trace!("Drift tick: {} flipped, {} aged", report.flipped, report.aged);
        report
    }

    /// Either flip `slot` (resetting duration and timestamp together) or age
    /// it by a minute. Returns whether it flipped.
    pub fn step(&mut self, slot: &mut Slot, now: u64) -> bool {
        let p = flip_probability(&self.config, slot);

        if self.rng.random::<f64>() < p {
            slot.state = slot.state.flipped();
            slot.duration = 0;
            slot.last_updated = now;
            true
        } else {
            slot.duration = slot.duration.saturating_add(1);
            false
        }
    }
}
