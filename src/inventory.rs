//! Inventory extraction.
//!
//! Turns one raw storage event record into an [`InventoryRecord`]. The
//! extraction is total: missing or malformed optional fields degrade to
//! `None`, and team/product are derived purely by position in the key.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::types::{InventoryRecord, PathDepth, RawStorageEventRecord, StorageInfo};

const URI_SCHEME: &str = "s3";
const KEY_SEPARATOR: char = '/';
const EXTENSION_SEPARATOR: char = '.';
const UTC_OFFSET: &str = "+00:00";

/// Build the canonical inventory record for one raw event record.
pub fn extract(record: &RawStorageEventRecord) -> InventoryRecord {
    let bucket = record.bucket_name().map(str::to_string);
    let key = record.object_key().map(str::to_string);
    let key_str = key.as_deref().unwrap_or_default();

    let (team, product) = derive_team_and_product(key.as_deref());
    let filename = filename_of(key_str).to_string();
    let file_ext = extension_of(&filename).to_string();

    let object_date = record.event_time().and_then(parse_event_time);
    if object_date.is_none() && record.event_time().is_some() {
        debug!(
            key = key_str,
            event_time = record.event_time(),
            "eventTime could not be parsed, leaving object_date empty."
        );
    }

    InventoryRecord {
        team,
        product,
        storage_info: StorageInfo {
            uri: format!(
                "{URI_SCHEME}://{}/{}",
                bucket.as_deref().unwrap_or_default(),
                key_str
            ),
            bucket,
            filename,
            file_size: record.object_size(),
            file_ext,
            object_date,
            e_tag: record.e_tag().map(str::to_string),
            file_depths: compute_path_depths(key.as_deref()),
            key,
        },
    }
}

/// Segment 0 of the key is the team, segment 1 the product.
///
/// A key without a separator is its own team. An empty or absent key has
/// neither.
pub fn derive_team_and_product(key: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return (None, None);
    };

    let mut segments = key.split(KEY_SEPARATOR);
    let team = segments.next().map(str::to_string);
    let product = segments.next().map(str::to_string);
    (team, product)
}

/// One entry per `/`-delimited segment, in key order.
pub fn compute_path_depths(key: Option<&str>) -> Vec<PathDepth> {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return vec![];
    };

    key.split(KEY_SEPARATOR)
        .enumerate()
        .map(|(depth, value)| PathDepth {
            depth,
            value: value.to_string(),
        })
        .collect()
}

/// The last path component of the key.
pub fn filename_of(key: &str) -> &str {
    key.rsplit(KEY_SEPARATOR).next().unwrap_or(key)
}

/// Everything after the last `.` of the filename, or empty.
pub fn extension_of(filename: &str) -> &str {
    filename
        .rsplit_once(EXTENSION_SEPARATOR)
        .map(|(_, ext)| ext)
        .unwrap_or_default()
}

/// Parse an ISO-8601 event time into a UTC instant.
///
/// A trailing `Z` is rewritten to an explicit `+00:00` offset first.
/// Timestamps without any offset are taken as UTC. Anything that does not
/// parse yields `None`.
pub fn parse_event_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let normalized = match trimmed.strip_suffix('Z') {
        Some(without_zone) => format!("{without_zone}{UTC_OFFSET}"),
        None => trimmed.to_string(),
    };

    if let Ok(instant) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(instant.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
