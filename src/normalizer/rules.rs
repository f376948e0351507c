//! Extraction rules for the payload shapes upstream servers are known to send.
//!
//! Each shape is an [`ExtractionStrategy`]. Strategies are tried in order and
//! the first one that recognises the payload wins:
//! - `{ "slots": [...] }`
//! - `{ "displays": [...] }` or `{ "displays": { "<id>": {...} } }`
//! - a bare array of records
//!
//! Field coercion is lenient: numbers may arrive as strings, and missing fields
//! fall back to the store defaults.

use serde_json::{Map, Value};

use crate::model::slot::{DEFAULT_FLOOR, DEFAULT_ZONE};
use crate::model::{Slot, SlotDelta, SlotState};

/// One way of pulling full slot records out of a `data` payload.
///
/// Returns `None` when the payload does not have this shape, so the next
/// strategy gets a go. `Some(vec![])` means "this shape, zero records".
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>>;
}

/// `data.slots` is a list of records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotsField;

/// `data.displays` is a list of records, or a map keyed by slot id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplaysField;

/// `data` itself is a list of records.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareArray;

impl ExtractionStrategy for SlotsField {
    fn name(&self) -> &'static str {
        "slots"
    }

    fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>> {
        let list = data.get("slots")?.as_array()?;
        Some(slots_from_list(list, now))
    }
}

impl ExtractionStrategy for DisplaysField {
    fn name(&self) -> &'static str {
        "displays"
    }

    fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>> {
        match data.get("displays")? {
            Value::Array(list) => Some(slots_from_list(list, now)),
            Value::Object(map) => Some(
                map.iter()
                    .filter_map(|(id, body)| slot_from_value(body, Some(id.as_str()), now))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl ExtractionStrategy for BareArray {
    fn name(&self) -> &'static str {
        "array"
    }

    fn extract(&self, data: &Value, now: u64) -> Option<Vec<Slot>> {
        let list = data.as_array()?;
        Some(slots_from_list(list, now))
    }
}

/// The built-in chain, in precedence order.
pub fn default_chain() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![Box::new(SlotsField), Box::new(DisplaysField), Box::new(BareArray)]
}

fn slots_from_list(list: &[Value], now: u64) -> Vec<Slot> {
    list.iter()
        .filter_map(|item| slot_from_value(item, None, now))
        .collect()
}

/// Build a full record, defaulting every missing field.
///
/// `id_override` is used for keyed payloads where the id is the map key.
/// Records without a usable id are skipped.
pub fn slot_from_value(value: &Value, id_override: Option<&str>, now: u64) -> Option<Slot> {
    let obj = value.as_object()?;
    let id = match id_override {
        Some(id) => id.to_string(),
        None => obj.get("id").and_then(as_string)?,
    };

    Some(Slot {
        id,
        state: obj
            .get("state")
            .and_then(Value::as_str)
            .and_then(SlotState::parse)
            .unwrap_or_default(),
        zone: obj
            .get("zone")
            .and_then(as_string)
            .unwrap_or_else(|| DEFAULT_ZONE.to_string()),
        floor: obj.get("floor").and_then(as_i64).unwrap_or(DEFAULT_FLOOR),
        last_updated: last_updated(obj).unwrap_or(now),
        duration: obj.get("duration").and_then(as_u32).unwrap_or(0),
    })
}

/// Build a partial record. Only `id` is required; unparseable fields are
/// treated as absent.
pub fn delta_from_value(value: &Value) -> Option<SlotDelta> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(as_string)?;

    Some(SlotDelta {
        id,
        state: obj
            .get("state")
            .and_then(Value::as_str)
            .and_then(SlotState::parse),
        zone: obj.get("zone").and_then(as_string),
        floor: obj.get("floor").and_then(as_i64),
        duration: obj.get("duration").and_then(as_u32),
        last_updated: last_updated(obj),
    })
}

fn last_updated(obj: &Map<String, Value>) -> Option<u64> {
    obj.get("lastUpdated")
        .or_else(|| obj.get("last_updated"))
        .and_then(as_u64)
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn first_match(data: &Value) -> Option<(&'static str, Vec<Slot>)> {
        default_chain()
            .iter()
            .find_map(|s| s.extract(data, 1000).map(|slots| (s.name(), slots)))
    }

    #[test]
    fn test_slots_field_defaults() {
        let data = json!({"slots": [{"id": "A1"}]});
        let (name, slots) = first_match(&data).unwrap();

        assert_eq!(name, "slots");
        assert_eq!(slots, vec![Slot::new("A1", 1000)]);
    }

    #[test]
    fn test_slots_field_wins_over_displays() {
        let data = json!({
            "slots": [{"id": "S1"}],
            "displays": [{"id": "D1"}]
        });
        let (name, slots) = first_match(&data).unwrap();
        assert_eq!(name, "slots");
        assert_eq!(slots[0].id, "S1");
    }

    #[test]
    fn test_displays_keyed_map_uses_key_as_id() {
        let data = json!({"displays": {"B7": {"state": "occupied", "floor": "3"}}});
        let (name, slots) = first_match(&data).unwrap();

        assert_eq!(name, "displays");
        assert_eq!(slots[0].id, "B7");
        assert_eq!(slots[0].state, SlotState::Occupied);
        assert_eq!(slots[0].floor, 3);
    }

    #[test]
    fn test_displays_list() {
        let data = json!({"displays": [{"id": "B1", "state": "available"}]});
        let (_, slots) = first_match(&data).unwrap();
        assert_eq!(slots[0].state, SlotState::Vacant);
    }

    #[test]
    fn test_bare_array() {
        let data = json!([{"id": 12, "zone": "C", "duration": 4}]);
        let (name, slots) = first_match(&data).unwrap();

        assert_eq!(name, "array");
        assert_eq!(slots[0].id, "12");
        assert_eq!(slots[0].zone, "C");
        assert_eq!(slots[0].duration, 4);
    }

    #[test]
    fn test_nothing_extractable() {
        assert!(first_match(&json!({"uptime": 12})).is_none());
        assert!(first_match(&Value::Null).is_none());
        assert!(first_match(&json!({"displays": "n/a"})).is_none());
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let data = json!({"slots": [{"state": "occupied"}, {"id": "A2"}, 7]});
        let (_, slots) = first_match(&data).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, "A2");
    }

    #[test]
    fn test_delta_only_carries_present_fields() {
        let delta = delta_from_value(&json!({"id": "A1", "state": "free"})).unwrap();
        assert_eq!(delta.state, Some(SlotState::Vacant));
        assert_eq!(delta.zone, None);
        assert_eq!(delta.floor, None);
        assert_eq!(delta.last_updated, None);

        // unknown state is ignored rather than defaulted
        let delta = delta_from_value(&json!({"id": "A1", "state": "??"})).unwrap();
        assert_eq!(delta.state, None);

        assert!(delta_from_value(&json!({"state": "free"})).is_none());
    }
}
