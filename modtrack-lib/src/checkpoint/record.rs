use crate::Result;
use chrono::{DateTime, Utc};
use ohno::{IntoAppError, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version written by this build.
pub const CHECKPOINT_VERSION: u32 = 2;

/// A persisted progress marker for one long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub operation_id: String,

    /// Operation-specific progress; opaque to the store.
    pub state: Value,

    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Decode the stored state into the operation's own type.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.state.clone())
            .into_app_err_with(|| format!("decoding state of checkpoint '{}'", self.operation_id))
    }
}

/// Progress counters kept alongside a checkpoint's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointMetadata {
    pub total_items: Option<u64>,
    pub processed_items: u64,
    pub error_count: u64,
    pub quota_remaining: Option<u64>,
    pub quota_limit: Option<u64>,
    pub tool: Option<String>,
    pub operation_kind: Option<String>,
    pub save_count: u64,
    pub last_save_reason: Option<String>,
}

impl CheckpointMetadata {
    /// Fraction of the work done, when the total is known.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "item counts are far below 2^52")]
    pub fn progress_fraction(&self) -> Option<f64> {
        match self.total_items {
            Some(0) => Some(1.0),
            Some(total) => Some((self.processed_items as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// How a raw persisted document was interpreted.
#[derive(Debug)]
pub(super) enum Decoded {
    Current(Checkpoint),
    Migrated { from: u32, checkpoint: Checkpoint },
    Corrupt(String),
}

/// Interpret a persisted document, migrating older layouts.
///
/// Documents newer than [`CHECKPOINT_VERSION`] are rejected outright rather than
/// guessed at.
pub(super) fn decode(mut raw: Value, operation_id: &str) -> Result<Decoded> {
    let Some(object) = raw.as_object_mut() else {
        return Ok(Decoded::Corrupt("checkpoint is not a JSON object".into()));
    };

    let version = match object.get("version") {
        None => 1,
        Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(v) => v,
            None => return Ok(Decoded::Corrupt(format!("unusable version number {n}"))),
        },
        Some(Value::String(s)) => match s.split('.').next().and_then(|major| major.parse().ok()) {
            Some(v) => v,
            None => return Ok(Decoded::Corrupt(format!("unusable version string '{s}'"))),
        },
        Some(other) => return Ok(Decoded::Corrupt(format!("unusable version value {other}"))),
    };

    match version {
        0 | 1 => Ok(Decoded::Migrated {
            from: version,
            checkpoint: migrate_v1(object, operation_id),
        }),

        CHECKPOINT_VERSION => {
            let _ = object.insert("version".into(), Value::from(CHECKPOINT_VERSION));
            match serde_json::from_value(raw) {
                Ok(checkpoint) => Ok(Decoded::Current(checkpoint)),
                Err(e) => Ok(Decoded::Corrupt(e.to_string())),
            }
        }

        newer => bail!(
            "checkpoint '{operation_id}' uses schema version {newer}, but only versions up to {CHECKPOINT_VERSION} are supported"
        ),
    }
}

/// Version 1 stored `{processed_files, files_data, timestamp}` at the top level.
fn migrate_v1(object: &Map<String, Value>, operation_id: &str) -> Checkpoint {
    let processed = object.get("processed_files").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
    let files_data = object.get("files_data").cloned().unwrap_or_else(|| Value::Object(Map::new()));
    let processed_items = processed.as_array().map_or(0, |a| a.len() as u64);

    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_f64)
        .and_then(timestamp_to_datetime)
        .unwrap_or_else(Utc::now);

    let mut state = Map::new();
    let _ = state.insert("processed".into(), processed);
    let _ = state.insert("files_data".into(), files_data);

    Checkpoint {
        version: CHECKPOINT_VERSION,
        operation_id: operation_id.to_string(),
        state: Value::Object(state),
        metadata: CheckpointMetadata {
            processed_items,
            tool: Some("legacy".into()),
            last_save_reason: Some("migrated from schema version 1".into()),
            ..CheckpointMetadata::default()
        },
        created_at: timestamp,
        updated_at: timestamp,
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "range checked by from_timestamp")]
fn timestamp_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }

    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
