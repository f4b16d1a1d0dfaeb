//! Deterministic event identifiers.
//!
//! Ids are `{CASE}_{YYYYMMDD}_{NNN}`: a case code naming the detector, the
//! event date and a per-generator counter. No randomness is involved, so
//! replaying the same inputs reproduces the same ids.

use crate::schema::SchemaError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static CASE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)*$").expect("static case code pattern is valid")
});

static EVENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9]*(?:_[A-Z0-9]+)*)_(\d{8})_(\d{3,})$")
        .expect("static event id pattern is valid")
});

/// Produces event ids for one case code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIdGenerator {
    case_code: String,
    counter: u64,
}

impl EventIdGenerator {
    /// Create a generator; the first id gets counter `001`.
    ///
    /// # Errors
    ///
    /// Returns error unless `case_code` is upper-case alphanumeric words
    /// joined by underscores, e.g. `DRIFT` or `MSE_002`
    pub fn new(case_code: impl Into<String>) -> Result<Self, SchemaError> {
        let case_code = case_code.into();
        if !CASE_CODE.is_match(&case_code) {
            return Err(SchemaError::InvalidCaseCode(case_code));
        }
        Ok(Self {
            case_code,
            counter: 0,
        })
    }

    /// Continue after `issued` ids have already been handed out
    #[must_use]
    pub fn resume(mut self, issued: u64) -> Self {
        self.counter = issued;
        self
    }

    /// Case code
    #[must_use]
    pub fn case_code(&self) -> &str {
        &self.case_code
    }

    /// Number of ids issued so far
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.counter
    }

    /// Next id for an event on `date`
    pub fn next_id(&mut self, date: NaiveDate) -> String {
        self.counter += 1;
        format!(
            "{}_{}_{:03}",
            self.case_code,
            date.format("%Y%m%d"),
            self.counter
        )
    }
}

/// Parts of a well-formed event id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIdParts {
    /// Case code
    pub case_code: String,
    /// Event date
    pub date: NaiveDate,
    /// Counter value
    pub counter: u64,
}

/// Split an id produced by [`EventIdGenerator`]; `None` if it does not
/// follow the pattern.
#[must_use]
pub fn parse_event_id(id: &str) -> Option<EventIdParts> {
    let caps = EVENT_ID.captures(id)?;
    let date = NaiveDate::parse_from_str(caps.get(2)?.as_str(), "%Y%m%d").ok()?;
    let counter = caps.get(3)?.as_str().parse().ok()?;
    Some(EventIdParts {
        case_code: caps.get(1)?.as_str().to_string(),
        date,
        counter,
    })
}
