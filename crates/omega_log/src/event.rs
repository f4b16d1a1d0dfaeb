//! Audit event envelope.
//!
//! Every detector reports through the same envelope. The `hash` field
//! covers every other field, including the link to the previous event.

use crate::timestamp::Timestamp;
use omega_core::{CanonicalValue, CanonicalizationError, Hash, Version, hash_object_typed};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope schema version written by this crate
pub const SCHEMA_VERSION: Version = Version::new(1, 0, 0);

/// Kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Drift classification between two runs
    DriftEvent,
    /// Replay verification of a run against its baseline
    ReplayEvent,
    /// Per-artifact run comparison
    DiffEvent,
    /// Misuse detector finding
    MisuseEvent,
    /// Incident record
    IncidentEvent,
    /// Manual override record
    OverrideEvent,
}

impl EventType {
    /// Every event type, in wire order
    pub const ALL: [EventType; 6] = [
        Self::DriftEvent,
        Self::ReplayEvent,
        Self::DiffEvent,
        Self::MisuseEvent,
        Self::IncidentEvent,
        Self::OverrideEvent,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DriftEvent => "drift_event",
            Self::ReplayEvent => "replay_event",
            Self::DiffEvent => "diff_event",
            Self::MisuseEvent => "misuse_event",
            Self::IncidentEvent => "incident_event",
            Self::OverrideEvent => "override_event",
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Automatic action taken by a detector. Detectors only report, so the
/// single value is `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    /// Nothing was done
    #[default]
    None,
}

/// One entry of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Kind of event
    pub event_type: EventType,
    /// Envelope schema version
    pub schema_version: Version,
    /// `{CASE}_{YYYYMMDD}_{NNN}`
    pub event_id: String,
    /// When the event was recorded, as written on the wire
    pub timestamp: Timestamp,
    /// Type-specific body
    pub payload: CanonicalValue,
    /// Always [`AutoAction::None`]
    pub auto_action_taken: AutoAction,
    /// Always `true`
    pub requires_human_decision: bool,
    /// Hash of the previous event, `None` for the first
    pub log_chain_prev_hash: Option<Hash>,
    /// Hash of this event without this field
    pub hash: Hash,
}

/// Hashed view of an event: every field except `hash`
#[derive(Serialize)]
struct EventBody<'a> {
    event_type: EventType,
    schema_version: &'a Version,
    event_id: &'a str,
    timestamp: &'a Timestamp,
    payload: &'a CanonicalValue,
    auto_action_taken: AutoAction,
    requires_human_decision: bool,
    log_chain_prev_hash: Option<&'a Hash>,
}

impl AuditEvent {
    /// Build a sealed event.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be canonicalized
    pub fn new(
        event_type: EventType,
        event_id: impl Into<String>,
        timestamp: impl Into<Timestamp>,
        payload: CanonicalValue,
        prev_hash: Option<Hash>,
    ) -> Result<Self, CanonicalizationError> {
        let mut event = Self {
            event_type,
            schema_version: SCHEMA_VERSION,
            event_id: event_id.into(),
            timestamp: timestamp.into(),
            payload,
            auto_action_taken: AutoAction::None,
            requires_human_decision: true,
            log_chain_prev_hash: prev_hash,
            hash: Hash::empty(),
        };
        event.hash = event.compute_hash()?;
        Ok(event)
    }

    /// Recompute the hash from the current field values.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be canonicalized
    pub fn compute_hash(&self) -> Result<Hash, CanonicalizationError> {
        hash_object_typed(&EventBody {
            event_type: self.event_type,
            schema_version: &self.schema_version,
            event_id: &self.event_id,
            timestamp: &self.timestamp,
            payload: &self.payload,
            auto_action_taken: self.auto_action_taken,
            requires_human_decision: self.requires_human_decision,
            log_chain_prev_hash: self.log_chain_prev_hash.as_ref(),
        })
    }

    /// True if the stored hash matches the content
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.compute_hash().is_ok_and(|h| h == self.hash)
    }

    /// True if the event reports without acting and defers to a human
    #[must_use]
    pub fn is_non_actuating(&self) -> bool {
        self.auto_action_taken == AutoAction::None && self.requires_human_decision
    }
}
