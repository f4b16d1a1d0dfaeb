//! Append-only, hash-chained audit log.
//!
//! Each event stores the hash of its predecessor in `log_chain_prev_hash`.
//! Verification walks the chain once from the first event; the first broken
//! link taints every event after it.

use crate::event::{AuditEvent, EventType, SCHEMA_VERSION};
use crate::id::EventIdGenerator;
use crate::schema::{SchemaError, validate_envelope};
use chrono::{DateTime, Utc};
use omega_core::{CanonicalizationError, Hash, to_canonical_value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Audit log errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    /// Payload could not be canonicalized
    #[error("cannot canonicalize event payload: {0}")]
    Canonicalization(#[from] CanonicalizationError),
    /// Line is not valid JSON or not a valid event
    #[error("line {line}: invalid JSON: {message}")]
    Json {
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },
    /// Line violates the envelope schema
    #[error("line {line}: {source}")]
    Schema {
        /// 1-based line number
        line: usize,
        /// Violation
        #[source]
        source: SchemaError,
    },
    /// Case code rejected
    #[error(transparent)]
    InvalidCaseCode(SchemaError),
}

/// Verification outcome for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Content and link check out
    Valid,
    /// Stored hash does not match the content
    Tampered,
    /// `log_chain_prev_hash` does not name the previous event
    BrokenLink,
    /// Sealed and linked, but acts automatically or has an incompatible
    /// schema version
    EnvelopeViolation,
    /// Follows an earlier break and cannot be trusted
    AfterBreak,
}

/// Result of walking a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// One status per event, in log order
    pub statuses: Vec<EventStatus>,
    /// Index of the first event that is not [`EventStatus::Valid`]
    pub first_broken: Option<usize>,
}

impl ChainVerification {
    /// True if every event is valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.first_broken.is_none()
    }

    /// Number of events that verified
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.first_broken.unwrap_or(self.statuses.len())
    }
}

fn check_event(event: &AuditEvent, expected_prev: Option<Hash>) -> EventStatus {
    if !event.is_sealed() {
        return EventStatus::Tampered;
    }
    if event.log_chain_prev_hash != expected_prev {
        return EventStatus::BrokenLink;
    }
    if !event.is_non_actuating() || !event.schema_version.is_compatible_with(&SCHEMA_VERSION) {
        return EventStatus::EnvelopeViolation;
    }
    EventStatus::Valid
}

/// Verify a sequence of events from the first one onwards.
#[must_use]
pub fn verify_chain(events: &[AuditEvent]) -> ChainVerification {
    let mut statuses = Vec::with_capacity(events.len());
    let mut first_broken = None;
    let mut expected_prev = None;

    for (i, event) in events.iter().enumerate() {
        let status = if first_broken.is_some() {
            EventStatus::AfterBreak
        } else {
            check_event(event, expected_prev)
        };
        if status != EventStatus::Valid && first_broken.is_none() {
            warn!(
                index = i,
                event_id = %event.event_id,
                ?status,
                "audit chain broken"
            );
            first_broken = Some(i);
        }
        statuses.push(status);
        expected_prev = Some(event.hash);
    }

    ChainVerification {
        statuses,
        first_broken,
    }
}

/// Append-only audit log for one case code
#[derive(Debug, Clone)]
pub struct AuditLog {
    events: Vec<AuditEvent>,
    ids: EventIdGenerator,
}

impl AuditLog {
    /// Create an empty log whose ids use `case_code`.
    ///
    /// # Errors
    ///
    /// Returns error if the case code is not valid in an event id
    pub fn new(case_code: impl Into<String>) -> Result<Self, ChainError> {
        Ok(Self {
            events: Vec::new(),
            ids: EventIdGenerator::new(case_code).map_err(ChainError::InvalidCaseCode)?,
        })
    }

    /// Append an event linked to the current tip.
    ///
    /// The id is derived from the case code, the timestamp's date and the
    /// number of events appended so far.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be canonicalized; the log is
    /// unchanged in that case
    pub fn append<T: Serialize + ?Sized>(
        &mut self,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        payload: &T,
    ) -> Result<&AuditEvent, ChainError> {
        let payload = to_canonical_value(payload)?;
        let mut ids = self.ids.clone();
        let event_id = ids.next_id(timestamp.date_naive());
        let event = AuditEvent::new(event_type, event_id, timestamp, payload, self.tip())?;
        self.ids = ids;

        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            hash = %event.hash,
            "appended audit event"
        );
        let index = self.events.len();
        self.events.push(event);
        Ok(&self.events[index])
    }

    /// Hash of the last event
    #[must_use]
    pub fn tip(&self) -> Option<Hash> {
        self.events.last().map(|e| e.hash)
    }

    /// Events in append order
    #[must_use]
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing has been appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Case code used for ids
    #[must_use]
    pub fn case_code(&self) -> &str {
        self.ids.case_code()
    }

    /// Verify the whole chain
    #[must_use]
    pub fn verify(&self) -> ChainVerification {
        verify_chain(&self.events)
    }

    /// One JSON object per line, in append order.
    ///
    /// # Errors
    ///
    /// Returns error if an event cannot be serialized
    pub fn to_json_lines(&self) -> Result<String, ChainError> {
        let mut out = String::new();
        for (i, event) in self.events.iter().enumerate() {
            let line = serde_json::to_string(event).map_err(|e| ChainError::Json {
                line: i + 1,
                message: e.to_string(),
            })?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Load a log written by [`AuditLog::to_json_lines`].
    ///
    /// Each line is checked against the envelope schema. The chain itself
    /// is not verified here, so a tampered log can still be loaded and
    /// inspected with [`AuditLog::verify`]. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns error for the first line that is not valid JSON or violates
    /// the envelope schema
    pub fn from_json_lines(case_code: impl Into<String>, input: &str) -> Result<Self, ChainError> {
        let mut log = Self::new(case_code)?;
        for (i, raw) in input.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| ChainError::Json {
                    line,
                    message: e.to_string(),
                })?;
            validate_envelope(&value).map_err(|source| ChainError::Schema { line, source })?;
            let event: AuditEvent =
                serde_json::from_value(value).map_err(|e| ChainError::Json {
                    line,
                    message: e.to_string(),
                })?;
            log.events.push(event);
        }
        log.ids = log.ids.resume(log.events.len() as u64);
        debug!(events = log.events.len(), "loaded audit log");
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use omega_core::CanonicalValue;
    use proptest::prelude::*;
    use serde_json::json;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 4, 9, minute, 0).unwrap()
    }

    fn log_with(n: usize) -> AuditLog {
        let mut log = AuditLog::new("DRIFT").unwrap();
        for i in 0..n {
            log.append(
                EventType::DriftEvent,
                ts(i as u32 % 60),
                &json!({"index": i, "level": "SOFT"}),
            )
            .unwrap();
        }
        log
    }

    #[test]
    fn test_first_event_has_no_prev() {
        let log = log_with(1);
        assert!(log.events()[0].log_chain_prev_hash.is_none());
        assert_eq!(log.events()[0].event_id, "DRIFT_20260204_001");
    }

    #[test]
    fn test_events_link_to_predecessor() {
        let log = log_with(3);
        let e = log.events();
        assert_eq!(e[1].log_chain_prev_hash, Some(e[0].hash));
        assert_eq!(e[2].log_chain_prev_hash, Some(e[1].hash));
        assert_eq!(e[2].event_id, "DRIFT_20260204_003");
        assert_eq!(log.tip(), Some(e[2].hash));
        assert!(log.verify().is_valid());
    }

    #[test]
    fn test_empty_log_verifies() {
        let log = AuditLog::new("DRIFT").unwrap();
        let v = log.verify();
        assert!(v.is_valid());
        assert!(v.statuses.is_empty());
    }

    #[test]
    fn test_non_finite_payload_leaves_log_unchanged() {
        let mut log = log_with(1);
        let err = log
            .append(
                EventType::DriftEvent,
                ts(5),
                &std::collections::BTreeMap::from([("score", f64::NAN)]),
            )
            .unwrap_err();
        assert!(matches!(err, ChainError::Canonicalization(_)));
        assert_eq!(log.len(), 1);
        let next = log
            .append(EventType::DriftEvent, ts(6), &json!({}))
            .unwrap();
        assert_eq!(next.event_id, "DRIFT_20260204_002");
    }

    #[test]
    fn test_rehashed_forgery_breaks_next_link() {
        let log = log_with(3);
        let mut events = log.events().to_vec();
        events[1].payload = CanonicalValue::object([("forged", CanonicalValue::from(true))]);
        events[1].hash = events[1].compute_hash().unwrap();

        let v = verify_chain(&events);
        assert_eq!(v.statuses[1], EventStatus::Valid);
        assert_eq!(v.statuses[2], EventStatus::BrokenLink);
        assert_eq!(v.first_broken, Some(2));
    }

    #[test]
    fn test_envelope_violation_detected_even_when_rehashed() {
        let log = log_with(2);
        let mut events = log.events().to_vec();
        events[1].requires_human_decision = false;
        events[1].hash = events[1].compute_hash().unwrap();
        let v = verify_chain(&events);
        assert_eq!(v.statuses[1], EventStatus::EnvelopeViolation);
    }

    #[test]
    fn test_json_lines_round_trip() {
        let log = log_with(4);
        let text = log.to_json_lines().unwrap();
        assert_eq!(text.lines().count(), 4);

        let mut loaded = AuditLog::from_json_lines("DRIFT", &text).unwrap();
        assert_eq!(loaded.events(), log.events());
        assert!(loaded.verify().is_valid());

        let next = loaded
            .append(EventType::DriftEvent, ts(30), &json!({"index": 4}))
            .unwrap();
        assert_eq!(next.event_id, "DRIFT_20260204_005");
        assert!(loaded.verify().is_valid());
    }

    #[test]
    fn test_json_lines_rejects_unknown_property() {
        let log = log_with(2);
        let text = log.to_json_lines().unwrap();
        let mut lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        lines[1]["note"] = json!("smuggled");
        let doctored: String = lines.iter().map(|v| format!("{}\n", v)).collect();

        match AuditLog::from_json_lines("DRIFT", &doctored).unwrap_err() {
            ChainError::Schema { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, SchemaError::UnknownField("note".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tampered_import_loads_but_fails_verify() {
        let log = log_with(3);
        let text = log.to_json_lines().unwrap();
        let doctored = text.replacen("\"SOFT\"", "\"NONE\"", 1);
        let loaded = AuditLog::from_json_lines("DRIFT", &doctored).unwrap();
        let v = loaded.verify();
        assert_eq!(v.first_broken, Some(0));
        assert_eq!(
            v.statuses,
            vec![
                EventStatus::Tampered,
                EventStatus::AfterBreak,
                EventStatus::AfterBreak
            ]
        );
    }

    #[test]
    fn test_import_keeps_foreign_timestamp_text() {
        let body = json!({
            "event_type": "replay_event",
            "schema_version": "1.0.0",
            "event_id": "RPL_20260204_001",
            "timestamp": "2026-02-04T10:30:00.000Z",
            "payload": {"identical": true},
            "auto_action_taken": "none",
            "requires_human_decision": true,
            "log_chain_prev_hash": null
        });
        let mut wire = body.clone();
        wire["hash"] = json!(omega_core::hash_object(&body).unwrap());
        let text = format!("{}\n", wire);

        let loaded = AuditLog::from_json_lines("RPL", &text).unwrap();
        assert_eq!(loaded.verify().statuses, vec![EventStatus::Valid]);
        assert_eq!(
            loaded.events()[0].timestamp.as_str(),
            "2026-02-04T10:30:00.000Z"
        );

        let exported: serde_json::Value =
            serde_json::from_str(loaded.to_json_lines().unwrap().trim_end()).unwrap();
        assert_eq!(exported, wire);
    }

    proptest! {
        #[test]
        fn prop_tamper_localized(n in 1usize..12, k_seed in any::<prop::sample::Index>()) {
            let log = log_with(n);
            let k = k_seed.index(n);
            let mut events = log.events().to_vec();
            events[k].event_id.push('X');

            let v = verify_chain(&events);
            prop_assert_eq!(v.first_broken, Some(k));
            for (i, status) in v.statuses.iter().enumerate() {
                if i < k {
                    prop_assert_eq!(*status, EventStatus::Valid);
                } else {
                    prop_assert_ne!(*status, EventStatus::Valid);
                }
            }
        }
    }
}
