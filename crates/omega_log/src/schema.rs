//! Wire schema for audit events.
//!
//! The envelope is closed: unknown top-level properties are rejected so a
//! producer cannot smuggle unhashed data alongside an event.

use crate::event::EventType;
use crate::timestamp::Timestamp;
use omega_core::{Version, is_hex_hash};
use serde_json::Value;

/// Top-level properties an envelope may carry
pub const ENVELOPE_FIELDS: [&str; 9] = [
    "event_type",
    "schema_version",
    "event_id",
    "timestamp",
    "payload",
    "auto_action_taken",
    "requires_human_decision",
    "log_chain_prev_hash",
    "hash",
];

/// Wire-contract violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Envelope is not a JSON object
    #[error("event envelope must be a JSON object")]
    NotAnObject,
    /// Required property absent
    #[error("missing required property '{0}'")]
    MissingField(&'static str),
    /// Property outside the closed envelope
    #[error("unknown property '{0}'")]
    UnknownField(String),
    /// `event_type` outside the enum
    #[error("unknown event_type '{0}'")]
    UnknownEventType(String),
    /// Property present with the wrong shape
    #[error("invalid '{field}': {reason}")]
    InvalidField {
        /// Property name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Case code not usable in an event id
    #[error("invalid case code '{0}'")]
    InvalidCaseCode(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn required<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, SchemaError> {
    obj.get(field).ok_or(SchemaError::MissingField(field))
}

fn required_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    required(obj, field)?
        .as_str()
        .ok_or_else(|| invalid(field, "must be a string"))
}

/// Check a decoded envelope against the closed wire schema.
///
/// # Errors
///
/// Returns the first violation found
pub fn validate_envelope(value: &Value) -> Result<(), SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;

    if let Some(unknown) = obj
        .keys()
        .find(|k| !ENVELOPE_FIELDS.contains(&k.as_str()))
    {
        return Err(SchemaError::UnknownField(unknown.clone()));
    }

    let event_type = required_str(obj, "event_type")?;
    if EventType::from_wire(event_type).is_none() {
        return Err(SchemaError::UnknownEventType(event_type.to_string()));
    }

    let version = required_str(obj, "schema_version")?;
    Version::parse(version).map_err(|e| invalid("schema_version", e.to_string()))?;

    if required_str(obj, "event_id")?.is_empty() {
        return Err(invalid("event_id", "must not be empty"));
    }

    let timestamp = required_str(obj, "timestamp")?;
    Timestamp::parse(timestamp)
        .map_err(|e| invalid("timestamp", format!("not ISO-8601: {}", e)))?;

    required(obj, "payload")?;

    if required_str(obj, "auto_action_taken")? != "none" {
        return Err(invalid("auto_action_taken", "must be \"none\""));
    }

    if required(obj, "requires_human_decision")?.as_bool() != Some(true) {
        return Err(invalid("requires_human_decision", "must be true"));
    }

    match required(obj, "log_chain_prev_hash")? {
        Value::Null => {}
        Value::String(s) if is_hex_hash(s) => {}
        _ => return Err(invalid("log_chain_prev_hash", "must be null or a hex hash")),
    }

    if !is_hex_hash(required_str(obj, "hash")?) {
        return Err(invalid("hash", "must be a 64-char lowercase hex hash"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Value {
        json!({
            "event_type": "drift_event",
            "schema_version": "1.0.0",
            "event_id": "DRIFT_20260204_001",
            "timestamp": "2026-02-04T10:30:00Z",
            "payload": {"level": "HARD"},
            "auto_action_taken": "none",
            "requires_human_decision": true,
            "log_chain_prev_hash": null,
            "hash": "a".repeat(64)
        })
    }

    #[test]
    fn test_valid_envelope() {
        assert_eq!(validate_envelope(&envelope()), Ok(()));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let mut e = envelope();
        e["extra"] = json!(1);
        assert_eq!(
            validate_envelope(&e),
            Err(SchemaError::UnknownField("extra".to_string()))
        );
    }

    #[test]
    fn test_missing_required() {
        for field in ["event_type", "schema_version", "event_id", "timestamp"] {
            let mut e = envelope();
            e.as_object_mut().unwrap().remove(field);
            assert_eq!(validate_envelope(&e), Err(SchemaError::MissingField(field)));
        }
    }

    #[test]
    fn test_bad_values() {
        let cases = [
            ("event_type", json!("random_event")),
            ("schema_version", json!("1.0")),
            ("event_id", json!("")),
            ("timestamp", json!("yesterday")),
            ("auto_action_taken", json!("rollback")),
            ("requires_human_decision", json!(false)),
            ("log_chain_prev_hash", json!("ABC")),
            ("hash", json!(42)),
        ];
        for (field, value) in cases {
            let mut e = envelope();
            e[field] = value;
            assert!(validate_envelope(&e).is_err(), "{field} accepted");
        }
    }

    #[test]
    fn test_not_object() {
        assert_eq!(validate_envelope(&json!([1])), Err(SchemaError::NotAnObject));
    }
}
