// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted envelope format, shape validation and best-effort recovery.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use super::port::StorageError;
use crate::model::{Employee, EmployeeId, HierarchyTable};

/// Current schema version written into every envelope.
pub const SCHEMA_VERSION: &str = "1.0";

/// On-disk wrapper around the table payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Table payload.
    pub data: T,
    /// Write time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: Option<u64>,
    /// Schema version string (not the structural counter).
    #[serde(default)]
    pub version: String,
}

/// The structural predicate shared by load and save: `data` is an object
/// whose `allIds` is a list, `byId` a map and `version` a non-negative integer.
pub fn has_valid_shape(envelope: &Value) -> bool {
    envelope
        .get("data")
        .and_then(Value::as_object)
        .is_some_and(|data| {
            data.get("allIds").is_some_and(Value::is_array)
                && data.get("byId").is_some_and(Value::is_object)
                && data.get("version").and_then(Value::as_u64).is_some()
        })
}

/// Decode a parsed envelope, or explain why it is not usable as-is.
pub fn decode(envelope: &Value) -> Result<Envelope<HierarchyTable>, StorageError> {
    if !has_valid_shape(envelope) {
        return Err(StorageError::Corrupted("envelope shape is invalid".into()));
    }
    let decoded: Envelope<HierarchyTable> = serde_json::from_value(envelope.clone())
        .map_err(|e| StorageError::Corrupted(format!("table does not decode: {e}")))?;
    let violations = decoded.data.violations();
    if let Some(first) = violations.first() {
        return Err(StorageError::Corrupted(format!(
            "{} invariant violations, first: {first}",
            violations.len()
        )));
    }
    Ok(decoded)
}

/// Rebuild a consistent table from whatever parts of `envelope` are well typed.
///
/// Individually decodable `byId` entries survive, `allIds` strings keep their
/// order, a numeric `version` is kept; the result is then repaired so `allIds`
/// equals the keys of `byId` and all edges agree. Fails only when the envelope
/// is not a JSON object at all.
pub fn recover(envelope: &Value) -> Result<HierarchyTable, StorageError> {
    let Some(root) = envelope.as_object() else {
        return Err(StorageError::Corrupted("envelope is not an object".into()));
    };
    let empty = Map::new();
    let data = root.get("data").and_then(Value::as_object).unwrap_or(&empty);

    let mut by_id = BTreeMap::new();
    if let Some(entries) = data.get("byId").and_then(Value::as_object) {
        for (key, raw) in entries {
            match serde_json::from_value::<Employee>(raw.clone()) {
                Ok(employee) => {
                    by_id.insert(EmployeeId::new(key.as_str()), employee);
                }
                Err(err) => warn!(%key, %err, "dropping undecodable employee during recovery"),
            }
        }
    }

    let all_ids = data
        .get("allIds")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(EmployeeId::new)
                .collect()
        })
        .unwrap_or_default();

    let version = data.get("version").and_then(Value::as_u64).unwrap_or(0);

    let mut table = HierarchyTable::from_parts(by_id, all_ids, version);
    table.repair();
    Ok(table)
}

/// Wrap a legacy bare table (`{ byId, allIds, version }` at the top level)
/// into an envelope. Returns `None` when `value` is not in the legacy shape.
pub fn migrate_legacy(value: &Value, now_millis: u64) -> Option<Value> {
    let object = value.as_object()?;
    if object.contains_key("data") || !object.contains_key("byId") {
        return None;
    }
    Some(serde_json::json!({
        "data": value,
        "lastModified": now_millis,
        "version": SCHEMA_VERSION,
    }))
}
