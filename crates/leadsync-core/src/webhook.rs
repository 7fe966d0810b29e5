//! Webhook payload normalization.
//!
//! amoCRM delivers change notifications either as structured JSON or as a
//! form-encoded body whose keys use bracketed index notation
//! (`leads[update][0][id]=42`). Both transports normalize to one canonical
//! `serde_json::Value` before any reconciliation logic sees them. The payload
//! is only ever treated as a trigger: downstream re-fetches authoritative
//! deal state instead of trusting the notification's field set.

use crate::error::{Result, SyncError};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Event extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// One deal event pulled out of a normalized payload. The id stays optional
/// here so the reconciler can classify a malformed entry as skipped rather
/// than dropping it silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub deal_id: Option<i64>,
}

/// Extract deal events from a canonical payload. Only the `leads.update` and
/// `leads.add` envelopes are deal events; everything else yields nothing and
/// terminates upstream as an unhandled-event skip.
pub fn extract_events(payload: &Value) -> Vec<RawEvent> {
    let Some(leads) = payload.get("leads") else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for (key, kind) in [("update", EventKind::Updated), ("add", EventKind::Created)] {
        if let Some(entries) = leads.get(key).and_then(Value::as_array) {
            for entry in entries {
                events.push(RawEvent {
                    kind,
                    deal_id: entry.get("id").and_then(value_as_i64),
                });
            }
        }
    }
    events
}

/// Integer coercion across both transports: JSON numbers arrive as numbers,
/// form-encoded ones arrive as strings.
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Body parsing
// ---------------------------------------------------------------------------

pub fn parse_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|e| SyncError::MalformedPayload(format!("invalid JSON body: {e}")))
}

/// Reconstruct a form-encoded body with bracketed keys into the nested shape
/// its JSON equivalent would have. Numeric segments become array indices,
/// everything else becomes object keys.
pub fn parse_form(body: &str) -> Result<Value> {
    let mut root = Value::Object(Map::new());
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        let path = split_key(&key)?;
        insert_path(&mut root, &path, Value::String(value.into_owned()))
            .map_err(|_| SyncError::MalformedPayload(format!("form index out of range in '{key}'")))?;
    }
    Ok(root)
}

/// Arrays are padded out to the largest index seen, so an unauthenticated
/// body must not be able to name an arbitrarily large one. Real payloads
/// carry a handful of entries.
const MAX_FORM_INDEX: usize = 1000;

struct IndexOutOfRange;

/// Split `leads[update][0][id]` into `["leads", "update", "0", "id"]`.
fn split_key(key: &str) -> Result<Vec<String>> {
    let malformed = || SyncError::MalformedPayload(format!("malformed form key '{key}'"));

    let head_end = key.find('[').unwrap_or(key.len());
    let head = &key[..head_end];
    if head.is_empty() {
        return Err(malformed());
    }

    let mut segments = vec![head.to_string()];
    let mut rest = &key[head_end..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(malformed());
        }
        let close = rest.find(']').ok_or_else(malformed)?;
        let segment = &rest[1..close];
        if segment.contains('[') {
            return Err(malformed());
        }
        segments.push(segment.to_string());
        rest = &rest[close + 1..];
    }
    Ok(segments)
}

fn insert_path(
    node: &mut Value,
    path: &[String],
    value: Value,
) -> std::result::Result<(), IndexOutOfRange> {
    let (segment, rest) = match path.split_first() {
        Some(split) => split,
        None => {
            *node = value;
            return Ok(());
        }
    };

    match segment.parse::<usize>() {
        Ok(index) => {
            if index > MAX_FORM_INDEX {
                return Err(IndexOutOfRange);
            }
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let items = node.as_array_mut().unwrap();
            while items.len() <= index {
                items.push(Value::Null);
            }
            insert_path(&mut items[index], rest, value)
        }
        Err(_) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let map = node.as_object_mut().unwrap();
            insert_path(map.entry(segment.clone()).or_insert(Value::Null), rest, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_body_reconstructs_nested_shape() {
        let payload =
            parse_form("leads[update][0][id]=42&leads[update][0][price]=500").unwrap();
        assert_eq!(
            payload,
            json!({"leads": {"update": [{"id": "42", "price": "500"}]}})
        );
    }

    #[test]
    fn form_and_json_bodies_yield_the_same_events() {
        let from_form =
            parse_form("leads[update][0][id]=42&leads[update][0][price]=500").unwrap();
        let from_json =
            parse_json(br#"{"leads":{"update":[{"id": 42, "price": 500}]}}"#).unwrap();
        assert_eq!(extract_events(&from_form), extract_events(&from_json));
        assert_eq!(
            extract_events(&from_json),
            vec![RawEvent {
                kind: EventKind::Updated,
                deal_id: Some(42),
            }]
        );
    }

    #[test]
    fn percent_encoded_values_are_decoded() {
        let payload = parse_form("leads[add][0][name]=Acme%20Corp").unwrap();
        assert_eq!(payload["leads"]["add"][0]["name"], "Acme Corp");
    }

    #[test]
    fn sparse_indices_pad_with_null() {
        let payload = parse_form("leads[update][2][id]=7").unwrap();
        let entries = payload["leads"]["update"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_null());
        assert_eq!(entries[2]["id"], "7");
    }

    #[test]
    fn oversized_index_is_rejected_without_allocating() {
        // A few bytes of body must not be able to demand a multi-million
        // entry array.
        let err = parse_form("leads[update][5000000][id]=1").unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));
    }

    #[test]
    fn index_at_the_cap_is_still_accepted() {
        let payload = parse_form("leads[update][1000][id]=7").unwrap();
        assert_eq!(payload["leads"]["update"][1000]["id"], "7");
    }

    #[test]
    fn unbalanced_bracket_is_malformed() {
        let err = parse_form("leads[update[0][id]=42").unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_json(b"{not json").unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));
    }

    #[test]
    fn add_events_are_extracted_as_created() {
        let payload = parse_json(br#"{"leads":{"add":[{"id": 9}]}}"#).unwrap();
        assert_eq!(
            extract_events(&payload),
            vec![RawEvent {
                kind: EventKind::Created,
                deal_id: Some(9),
            }]
        );
    }

    #[test]
    fn non_deal_envelopes_yield_no_events() {
        let payload = parse_json(br#"{"contacts":{"update":[{"id": 1}]}}"#).unwrap();
        assert!(extract_events(&payload).is_empty());
    }

    #[test]
    fn missing_id_is_preserved_as_none() {
        let payload = parse_json(br#"{"leads":{"update":[{"price": 500}]}}"#).unwrap();
        assert_eq!(
            extract_events(&payload),
            vec![RawEvent {
                kind: EventKind::Updated,
                deal_id: None,
            }]
        );
    }

    #[test]
    fn non_numeric_id_is_preserved_as_none() {
        let payload = parse_json(br#"{"leads":{"update":[{"id": "abc"}]}}"#).unwrap();
        assert_eq!(extract_events(&payload)[0].deal_id, None);
    }
}
