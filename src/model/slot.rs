use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_ZONE: &str = "A";
pub const DEFAULT_FLOOR: i64 = 1;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Occupancy of a single bay.
///
/// The wire uses both `free` and `available` for the vacant case; they are
/// collapsed into [`SlotState::Vacant`] on the way in and written back out as
/// `free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    #[serde(rename = "free", alias = "available")]
    Vacant,
    #[serde(rename = "occupied")]
    Occupied,
}

impl SlotState {
    /// Lenient parse of a wire value. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" | "available" => Some(Self::Vacant),
            "occupied" => Some(Self::Occupied),
            _ => None,
        }
    }

    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Self::Vacant => Self::Occupied,
            Self::Occupied => Self::Vacant,
        }
    }

    #[inline]
    pub fn is_vacant(self) -> bool {
        matches!(self, Self::Vacant)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vacant => "free",
            Self::Occupied => "occupied",
        }
    }
}

impl Default for SlotState {
    fn default() -> Self {
        Self::Vacant
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One physical bay as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub state: SlotState,
    pub zone: String,
    pub floor: i64,
    /// Epoch millis of the last state-affecting write
    pub last_updated: u64,
    /// Minutes spent in the current state
    pub duration: u32,
}

impl Slot {
    /// A vacant slot with every field at its default.
    pub fn new(id: impl Into<String>, now: u64) -> Self {
        Self {
            id: id.into(),
            state: SlotState::Vacant,
            zone: DEFAULT_ZONE.to_string(),
            floor: DEFAULT_FLOOR,
            last_updated: now,
            duration: 0,
        }
    }

    pub fn with_state(mut self, state: SlotState) -> Self {
        self.state = state;
        self
    }

    pub fn with_floor(mut self, floor: i64) -> Self {
        self.floor = floor;
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }
}

/// A partial record merged onto an existing slot. Only `id` is mandatory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotDelta {
    pub id: String,
    pub state: Option<SlotState>,
    pub zone: Option<String>,
    pub floor: Option<i64>,
    pub duration: Option<u32>,
    pub last_updated: Option<u64>,
}

impl SlotDelta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn state(mut self, state: SlotState) -> Self {
        self.state = Some(state);
        self
    }
}
