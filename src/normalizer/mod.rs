//! Turns inbound envelopes into store mutations and operational notices.
//!
//! The upstream servers do not agree on a payload shape, so full records are
//! pulled out through an ordered chain of [`ExtractionStrategy`]s (see
//! [`rules`]). The envelope `type` only decides what to do with the result:
//! - `initial_data`, `status` and unknown types: full snapshot, if any records are found
//!   (a payload that yields zero records leaves the store alone)
//! - `bulk_update`: delta batch from `data.updates`
//! - `single_update`: delta batch of one
//! - `system_status`, `ping`, `error`: no mutation, surfaced to ops only

pub mod rules;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::MirrorError;
use crate::model::{Envelope, MessageKind, Slot, SlotDelta};
use crate::ops::OpsEvent;

pub use rules::{BareArray, DisplaysField, ExtractionStrategy, SlotsField};

/// Partial records to merge, plus the count the server reported.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaBatch {
    pub deltas: Vec<SlotDelta>,
    pub count: usize,
}

/// A change to apply to the store as one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreMutation {
    Snapshot(Vec<Slot>),
    Deltas(DeltaBatch),
}

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub kind: MessageKind,
    pub mutation: Option<StoreMutation>,
    pub notice: Option<OpsEvent>,
}

impl Dispatch {
    fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            mutation: None,
            notice: None,
        }
    }

    /// Nothing to do for this frame.
    pub fn is_empty(&self) -> bool {
        self.mutation.is_none() && self.notice.is_none()
    }
}

pub struct Normalizer {
    chain: Vec<Box<dyn ExtractionStrategy>>,
}

impl Normalizer {
    /// Normalizer with the built-in extraction chain.
    pub fn new() -> Self {
        Self {
            chain: rules::default_chain(),
        }
    }

    /// Append a strategy; it is tried after the existing ones.
    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.chain.push(Box::new(strategy));
        self
    }

    /// Parse a raw text frame and normalize it.
    ///
    /// Frames that are not a `{type, data}` object fail with
    /// [`MirrorError::ParseError`]; everything else normalizes, possibly to an
    /// empty [`Dispatch`].
    pub fn normalize(&self, raw: &str, now: u64) -> Result<Dispatch, MirrorError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        Ok(self.dispatch(envelope, now))
    }

    pub fn dispatch(&self, envelope: Envelope, now: u64) -> Dispatch {
        let kind = envelope.message_kind();
        let mut out = Dispatch::new(kind.clone());
        let data = envelope.data;

        match kind {
            MessageKind::InitialData => {
                out.mutation = self.snapshot(&data, now);
            }
            MessageKind::BulkUpdate => {
                out.mutation = bulk_deltas(&data, now);
            }
            MessageKind::SingleUpdate => {
                out.mutation = rules::delta_from_value(&data).map(|delta| {
                    StoreMutation::Deltas(DeltaBatch {
                        deltas: vec![with_timestamp(delta, now)],
                        count: 1,
                    })
                });
            }
            MessageKind::Status => {
                // Some servers embed slot data in status frames
                out.mutation = self.snapshot(&data, now);
                out.notice = Some(OpsEvent::ServerStatus(data));
            }
            MessageKind::SystemStatus => {
                out.notice = Some(OpsEvent::SystemStatus(data));
            }
            MessageKind::Ping => {
                out.notice = Some(OpsEvent::Ping(data));
            }
            MessageKind::Error => {
                out.notice = Some(OpsEvent::ServerError(data));
            }
            MessageKind::Other(ref name) => {
                out.mutation = self.snapshot(&data, now);
                if out.mutation.is_none() {
                    trace!("Ignoring '{}' frame without slot data", name);
                }
            }
        }

        out
    }

    /// Run the extraction chain, first match wins.
    pub fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>> {
        self.chain.iter().find_map(|strategy| {
            let slots = strategy.extract(data, now)?;
            debug!("Extracted {} slots via '{}'", slots.len(), strategy.name());
            Some(slots)
        })
    }

    fn snapshot(&self, data: &Value, now: u64) -> Option<StoreMutation> {
        self.extract(data, now)
            .filter(|slots| !slots.is_empty())
            .map(StoreMutation::Snapshot)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Only `updates` has to be well formed; `updateCount` and `timestamp` are
/// informational and never cost the batch.
fn bulk_deltas(data: &Value, now: u64) -> Option<StoreMutation> {
    let updates = match data.get("updates") {
        Some(Value::Array(updates)) => updates,
        Some(other) => {
            warn!("Ignoring bulk_update whose 'updates' is not a list: {}", other);
            return None;
        }
        None => return None,
    };

    let deltas: Vec<SlotDelta> = updates
        .iter()
        .filter_map(rules::delta_from_value)
        .map(|delta| with_timestamp(delta, now))
        .collect();

    if deltas.is_empty() {
        return None;
    }

    let count = data
        .get("updateCount")
        .and_then(rules::as_u64)
        .map(|c| c as usize)
        .unwrap_or(deltas.len());
    Some(StoreMutation::Deltas(DeltaBatch { deltas, count }))
}

fn with_timestamp(mut delta: SlotDelta, now: u64) -> SlotDelta {
    delta.last_updated.get_or_insert(now);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotState;
    use crate::store::SlotStore;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000_000;

    fn normalize(raw: &str) -> Dispatch {
        Normalizer::new().normalize(raw, NOW).unwrap()
    }

    #[test]
    fn test_initial_data_snapshot() {
        let out = normalize(
            r#"{"type":"initial_data","data":{"slots":[{"id":"A1","state":"occupied","floor":1,"zone":"A"}]}}"#,
        );

        match out.mutation {
            Some(StoreMutation::Snapshot(slots)) => {
                assert_eq!(slots.len(), 1);
                assert_eq!(slots[0].id, "A1");
                assert_eq!(slots[0].state, SlotState::Occupied);
                assert_eq!(slots[0].duration, 0);
                assert_eq!(slots[0].last_updated, NOW);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert!(out.notice.is_none());
    }

    #[test]
    fn test_bulk_update_deltas() {
        let out = normalize(
            r#"{"type":"bulk_update","data":{"updates":[{"id":"A1","state":"free"},{"id":"A2","lastUpdated":5}],"updateCount":2}}"#,
        );

        let Some(StoreMutation::Deltas(batch)) = out.mutation else {
            panic!("expected deltas");
        };
        assert_eq!(batch.count, 2);
        assert_eq!(batch.deltas[0].state, Some(SlotState::Vacant));
        assert_eq!(batch.deltas[0].last_updated, Some(NOW));
        assert_eq!(batch.deltas[1].last_updated, Some(5));
    }

    #[test]
    fn test_bulk_update_without_updates_is_noop() {
        let out = normalize(r#"{"type":"bulk_update","data":{"timestamp":1}}"#);
        assert!(out.is_empty());
    }

    #[test]
    fn test_bulk_update_tolerates_odd_metadata() {
        for raw in [
            r#"{"type":"bulk_update","data":{"updates":[{"id":"A1","state":"occupied"}],"updateCount":"1"}}"#,
            r#"{"type":"bulk_update","data":{"updates":[{"id":"A1","state":"occupied"}],"timestamp":"2024-01-01T00:00:00Z"}}"#,
        ] {
            let mut store = SlotStore::new();
            store.apply_snapshot(vec![Slot::new("A1", 1)]);

            let Some(StoreMutation::Deltas(batch)) = normalize(raw).mutation else {
                panic!("deltas lost for {}", raw);
            };
            assert_eq!(batch.count, 1);
            store.apply_deltas(batch.deltas, NOW);
            assert_eq!(store.get("A1").unwrap().state, SlotState::Occupied);
        }
    }

    #[test]
    fn test_bulk_update_with_non_list_updates_is_noop() {
        let out = normalize(r#"{"type":"bulk_update","data":{"updates":{"id":"A1"}}}"#);
        assert!(out.is_empty());
    }

    #[test]
    fn test_frames_without_records_leave_store_alone() {
        let normalizer = Normalizer::new();
        let mut store = SlotStore::new();
        store.apply_snapshot(vec![Slot::new("A1", 1), Slot::new("A2", 1)]);

        for raw in [
            r#"{"type":"ack","data":[]}"#,
            r#"{"type":"status","data":{"slots":[]}}"#,
            r#"{"type":"status","data":{"slots":[{"name":"no id"}]}}"#,
            r#"{"type":"initial_data","data":{"displays":{}}}"#,
        ] {
            let out = normalizer.normalize(raw, NOW).unwrap();
            if let Some(StoreMutation::Snapshot(slots)) = out.mutation {
                store.apply_snapshot(slots);
            }
            assert_eq!(store.len(), 2, "{} changed the store", raw);
        }
    }

    #[test]
    fn test_single_update() {
        let out = normalize(r#"{"type":"single_update","data":{"id":"B2","floor":2}}"#);

        let Some(StoreMutation::Deltas(batch)) = out.mutation else {
            panic!("expected deltas");
        };
        assert_eq!(batch.count, 1);
        assert_eq!(batch.deltas.len(), 1);
        assert_eq!(batch.deltas[0].floor, Some(2));
    }

    #[test]
    fn test_status_with_embedded_slots() {
        let out = normalize(r#"{"type":"status","data":{"displays":{"C1":{}},"uptime":9}}"#);

        assert!(matches!(out.mutation, Some(StoreMutation::Snapshot(ref s)) if s.len() == 1));
        assert_eq!(
            out.notice,
            Some(OpsEvent::ServerStatus(json!({"displays":{"C1":{}},"uptime":9})))
        );
    }

    #[test]
    fn test_status_without_slots_still_notifies() {
        let out = normalize(r#"{"type":"status","data":{"clients":3}}"#);
        assert!(out.mutation.is_none());
        assert!(matches!(out.notice, Some(OpsEvent::ServerStatus(_))));
    }

    #[test]
    fn test_control_frames_never_mutate() {
        // even with slot-shaped data
        for kind in ["system_status", "ping", "error"] {
            let raw = format!(r#"{{"type":"{}","data":{{"slots":[{{"id":"X"}}]}}}}"#, kind);
            let out = normalize(&raw);
            assert!(out.mutation.is_none(), "{} mutated the store", kind);
            assert!(out.notice.is_some());
        }
    }

    #[test]
    fn test_unknown_type_best_effort() {
        let out = normalize(r#"{"type":"occupancy","data":[{"id":"D4"}]}"#);
        assert!(matches!(out.mutation, Some(StoreMutation::Snapshot(_))));

        let out = normalize(r#"{"type":"hello","data":{"version":"2"}}"#);
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_frame_is_parse_error() {
        let normalizer = Normalizer::new();
        assert!(matches!(
            normalizer.normalize("not json", NOW),
            Err(MirrorError::ParseError(_))
        ));
        assert!(normalizer.normalize(r#"[1,2,3]"#, NOW).is_err());
    }

    struct Legacy;

    impl ExtractionStrategy for Legacy {
        fn name(&self) -> &'static str {
            "legacy"
        }

        fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>> {
            let id = data.get("bay")?.as_str()?;
            Some(vec![Slot::new(id, now)])
        }
    }

    #[test]
    fn test_custom_strategy_appended() {
        let normalizer = Normalizer::new().with_strategy(Legacy);
        let out = normalizer
            .normalize(r#"{"type":"initial_data","data":{"bay":"L1"}}"#, NOW)
            .unwrap();

        let Some(StoreMutation::Snapshot(slots)) = out.mutation else {
            panic!("expected snapshot");
        };
        assert_eq!(slots[0].id, "L1");
    }
}
