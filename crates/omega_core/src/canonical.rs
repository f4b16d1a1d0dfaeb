//! Canonical JSON: deterministic serialization used as hashing input.
//!
//! Object keys are sorted lexicographically at every depth, array order is
//! preserved and values JSON cannot represent faithfully are rejected rather
//! than coerced. Two values hash the same iff their canonical text is
//! identical, whatever order their keys were inserted in.

use crate::hash::{Hash, sha256_hex};
use crate::ser::to_canonical_value;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Write as _;

/// Largest integer magnitude representable without loss in an IEEE-754
/// double (2^53 - 1).
pub const MAX_SAFE_INTEGER: i128 = 9_007_199_254_740_991;

/// A JSON-representable value with an explicit tag per kind.
///
/// Objects keep insertion order in memory; ordering is imposed only when the
/// value is written out canonically.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// Integer, must lie within ±[`MAX_SAFE_INTEGER`] to be written
    Integer(i128),
    /// Floating point, must be finite to be written
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered array
    Array(Vec<CanonicalValue>),
    /// String-keyed object
    Object(IndexMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonicalValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Parse JSON text into a value.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON
    pub fn parse(json: &str) -> Result<Self, CanonicalizationError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(Self::from(value))
    }

    /// Name of the value's kind, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Look up a key if this is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Write the canonical text form.
    ///
    /// # Errors
    ///
    /// Returns error for non-finite floats or unsafe integers anywhere in
    /// the tree
    pub fn to_canonical_string(&self) -> Result<String, CanonicalizationError> {
        let mut out = String::new();
        let mut path = JsonPath::root();
        write_value(&mut out, self, &mut path)?;
        Ok(out)
    }
}

impl From<serde_json::Value> for CanonicalValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Integer(i128::from(u))
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for CanonicalValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for CanonicalValue {
    fn from(v: i64) -> Self {
        Self::Integer(i128::from(v))
    }
}

impl From<f64> for CanonicalValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for CanonicalValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<CanonicalValue>> for CanonicalValue {
    fn from(v: Vec<CanonicalValue>) -> Self {
        Self::Array(v)
    }
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => match i64::try_from(*i) {
                Ok(small) => serializer.serialize_i64(small),
                Err(_) => serializer.serialize_i128(*i),
            },
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Error raised for input that has no canonical form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalizationError {
    /// NaN or ±Infinity
    #[error("non-finite number ({value}) at {path}")]
    NonFiniteNumber {
        /// Location in the value tree
        path: String,
        /// Rendered offending value
        value: String,
    },
    /// Integer beyond ±(2^53 - 1)
    #[error("unsafe integer (bigint) {value} at {path}")]
    UnsafeInteger {
        /// Location in the value tree
        path: String,
        /// Rendered offending value
        value: String,
    },
    /// Map key that is not a string
    #[error("object key must be a string, got {kind}")]
    NonStringKey {
        /// Kind of the rejected key
        kind: &'static str,
    },
    /// Input text was not JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Error raised by a `Serialize` implementation
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for CanonicalizationError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl From<serde_json::Error> for CanonicalizationError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

/// Canonical text of any serializable value.
///
/// # Errors
///
/// Returns [`CanonicalizationError`] naming the offending type and location
pub fn canonical_stringify<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, CanonicalizationError> {
    to_canonical_value(value)?.to_canonical_string()
}

/// Canonical UTF-8 bytes of any serializable value.
///
/// # Errors
///
/// Same as [`canonical_stringify`]
pub fn canonical_bytes<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, CanonicalizationError> {
    canonical_stringify(value).map(String::into_bytes)
}

/// `sha256_hex(canonical_stringify(value))`
///
/// # Errors
///
/// Same as [`canonical_stringify`]
pub fn hash_object<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalizationError> {
    canonical_stringify(value).map(|text| sha256_hex(&text))
}

/// Like [`hash_object`] but returns a typed [`Hash`].
///
/// # Errors
///
/// Same as [`canonical_stringify`]
pub fn hash_object_typed<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Hash, CanonicalizationError> {
    canonical_stringify(value).map(|text| Hash::compute(text.as_bytes()))
}

#[derive(Debug, Clone)]
struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

fn write_value(
    out: &mut String,
    value: &CanonicalValue,
    path: &mut JsonPath,
) -> Result<(), CanonicalizationError> {
    match value {
        CanonicalValue::Null => out.push_str("null"),
        CanonicalValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        CanonicalValue::Integer(i) => {
            if i.abs() > MAX_SAFE_INTEGER {
                return Err(CanonicalizationError::UnsafeInteger {
                    path: path.to_string(),
                    value: i.to_string(),
                });
            }
            let _ = write!(out, "{}", i);
        }
        CanonicalValue::Float(f) => write_float(out, *f, path)?,
        CanonicalValue::String(s) => out.push_str(&serde_json::to_string(s)?),
        CanonicalValue::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                path.segments.push(format!("[{}]", idx));
                write_value(out, item, path)?;
                path.segments.pop();
            }
            out.push(']');
        }
        CanonicalValue::Object(map) => {
            let mut entries: Vec<(&String, &CanonicalValue)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, child)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                path.segments.push(format!(".{}", key));
                write_value(out, child, path)?;
                path.segments.pop();
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_float(out: &mut String, f: f64, path: &JsonPath) -> Result<(), CanonicalizationError> {
    if !f.is_finite() {
        return Err(CanonicalizationError::NonFiniteNumber {
            path: path.to_string(),
            value: f.to_string(),
        });
    }
    write_number(out, f);
    Ok(())
}

/// ECMAScript `Number.prototype.toString`: plain decimal for exponents in
/// `[-7, 21)`, otherwise `d.ddde+N` with an explicit sign.
fn write_number(out: &mut String, f: f64) {
    if f == 0.0 {
        out.push('0');
        return;
    }
    if f < 0.0 {
        out.push('-');
    }
    // `{:e}` yields the shortest round-trip digits, e.g. `1.2345e-7`.
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let n = exp.parse::<i32>().unwrap_or(0) + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        let _ = write!(out, "{}.{}", int, frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = n - 1;
        let _ = write!(out, "e{}{}", if e < 0 { '-' } else { '+' }, e.abs());
    }
}
