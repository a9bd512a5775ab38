//! Queue message normalisation.
//!
//! A queue message body carries storage events in one of two shapes:
//!
//! ```text
//! direct:   {"Records": [ ... ]}
//! wrapped:  {"Type": "Notification", "Message": "{\"Records\": [ ... ]}"}
//! ```
//!
//! Each shape is tried in order and the first match wins. Neither
//! attempt uses errors for control flow; each reports a [`ShapeMatch`].

use serde_json::Value;
use tracing::trace;

use crate::types::RawStorageEventRecord;
use crate::types::error::S3IngestError;

const RECORDS_FIELD: &str = "Records";
const ENVELOPE_TYPE_FIELD: &str = "Type";
const ENVELOPE_MESSAGE_FIELD: &str = "Message";
const ENVELOPE_NOTIFICATION_TYPE: &str = "Notification";

const ERROR_MESSAGE_UNRECOGNIZED: &str =
    "message is neither a direct storage event nor a pub/sub-wrapped storage event";

/// Outcome of trying one message shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeMatch {
    Matched(Vec<RawStorageEventRecord>),
    NotMatched(&'static str),
}

/// Parse a queue message body into the storage event records it carries.
///
/// Returns the `Records` list of a direct event, or the inner `Records`
/// list of a pub/sub envelope. Anything else is a
/// [`S3IngestError::Format`]. There are no partial results.
pub fn normalize(message_body: &str) -> Result<Vec<RawStorageEventRecord>, S3IngestError> {
    let parsed: Option<Value> = serde_json::from_str(message_body).ok();

    let attempts: [fn(Option<&Value>) -> ShapeMatch; 2] = [match_direct, match_wrapped];
    let mut reasons = Vec::with_capacity(attempts.len());

    for attempt in attempts {
        match attempt(parsed.as_ref()) {
            ShapeMatch::Matched(records) => return Ok(records),
            ShapeMatch::NotMatched(reason) => {
                trace!(reason = reason, "message shape not matched.");
                reasons.push(reason);
            }
        }
    }

    Err(S3IngestError::Format(format!(
        "{ERROR_MESSAGE_UNRECOGNIZED} ({})",
        reasons.join("; ")
    )))
}

/// Direct event: a top-level object with a `Records` list.
pub fn match_direct(parsed: Option<&Value>) -> ShapeMatch {
    let Some(parsed) = parsed else {
        return ShapeMatch::NotMatched("body is not valid JSON");
    };

    match records_of(parsed) {
        Some(records) => ShapeMatch::Matched(records),
        None => ShapeMatch::NotMatched("no 'Records' list at top level"),
    }
}

/// Pub/sub envelope: `Type == "Notification"` and a `Message` string that
/// itself parses to an object with a `Records` list.
pub fn match_wrapped(parsed: Option<&Value>) -> ShapeMatch {
    let Some(parsed) = parsed else {
        return ShapeMatch::NotMatched("envelope is not valid JSON");
    };

    if parsed.get(ENVELOPE_TYPE_FIELD).and_then(Value::as_str) != Some(ENVELOPE_NOTIFICATION_TYPE)
    {
        return ShapeMatch::NotMatched("envelope 'Type' is not 'Notification'");
    }

    let Some(inner) = parsed.get(ENVELOPE_MESSAGE_FIELD).and_then(Value::as_str) else {
        return ShapeMatch::NotMatched("envelope has no 'Message' string");
    };

    let Ok(inner) = serde_json::from_str::<Value>(inner) else {
        return ShapeMatch::NotMatched("envelope 'Message' is not valid JSON");
    };

    match records_of(&inner) {
        Some(records) => ShapeMatch::Matched(records),
        None => ShapeMatch::NotMatched("envelope 'Message' has no 'Records' list"),
    }
}

fn records_of(value: &Value) -> Option<Vec<RawStorageEventRecord>> {
    value
        .get(RECORDS_FIELD)
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .cloned()
                .map(RawStorageEventRecord::new)
                .collect()
        })
}
