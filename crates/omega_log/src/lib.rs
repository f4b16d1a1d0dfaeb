//! OMEGA Audit Event Log
//!
//! A single envelope for every detector finding, sealed with a content hash
//! and chained to its predecessor. Detectors report through this log; they
//! never act on their own findings.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod event;
pub mod id;
pub mod schema;
pub mod timestamp;

pub use chain::{AuditLog, ChainError, ChainVerification, EventStatus, verify_chain};
pub use event::{AuditEvent, AutoAction, EventType, SCHEMA_VERSION};
pub use id::{EventIdGenerator, EventIdParts, parse_event_id};
pub use schema::{ENVELOPE_FIELDS, SchemaError, validate_envelope};
pub use timestamp::Timestamp;
