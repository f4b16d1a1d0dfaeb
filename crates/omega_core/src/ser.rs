//! `serde::Serializer` that builds a [`CanonicalValue`] tree.
//!
//! Going through this serializer rather than `serde_json::to_value` keeps
//! NaN and infinities intact so they are rejected at write time instead of
//! silently becoming `null`.

use crate::canonical::{CanonicalValue, CanonicalizationError};
use indexmap::IndexMap;
use serde::Serialize;
use serde::ser::{self, Impossible};

type Result<T> = std::result::Result<T, CanonicalizationError>;

/// Convert any serializable value into a [`CanonicalValue`].
///
/// # Errors
///
/// Returns error for non-string map keys, out of range 128-bit integers or
/// errors raised by the value's own `Serialize` impl
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<CanonicalValue> {
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;
    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Integer(i128::from(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<CanonicalValue> {
        i128::try_from(v)
            .map(CanonicalValue::Integer)
            .map_err(|_| CanonicalizationError::UnsafeInteger {
                path: "$".to_string(),
                value: v.to_string(),
            })
    }

    fn serialize_f32(self, v: f32) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<CanonicalValue> {
        Ok(CanonicalValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<CanonicalValue> {
        Ok(CanonicalValue::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Array(
            v.iter().map(|b| CanonicalValue::Integer(i128::from(*b))).collect(),
        ))
    }

    fn serialize_none(self) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<CanonicalValue> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<CanonicalValue> {
        Ok(CanonicalValue::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<CanonicalValue> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<CanonicalValue> {
        let mut map = IndexMap::new();
        map.insert(variant.to_owned(), value.serialize(ValueSerializer)?);
        Ok(CanonicalValue::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            name: variant.to_owned(),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap {
            map: IndexMap::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMap> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant> {
        Ok(SerializeStructVariant {
            name: variant.to_owned(),
            map: IndexMap::new(),
        })
    }
}

struct SerializeVec {
    items: Vec<CanonicalValue>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<CanonicalValue> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<CanonicalValue> {
        ser::SerializeSeq::end(self)
    }
}

struct SerializeTupleVariant {
    name: String,
    items: Vec<CanonicalValue>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CanonicalValue> {
        let mut map = IndexMap::new();
        map.insert(self.name, CanonicalValue::Array(self.items));
        Ok(CanonicalValue::Object(map))
    }
}

struct SerializeMap {
    map: IndexMap<String, CanonicalValue>,
    next_key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| CanonicalizationError::Custom("map value without key".to_string()))?;
        self.map.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Object(self.map))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.map.insert(key.to_owned(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CanonicalValue> {
        Ok(CanonicalValue::Object(self.map))
    }
}

struct SerializeStructVariant {
    name: String,
    map: IndexMap<String, CanonicalValue>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = CanonicalValue;
    type Error = CanonicalizationError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.map.insert(key.to_owned(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<CanonicalValue> {
        let mut outer = IndexMap::new();
        outer.insert(self.name, CanonicalValue::Object(self.map));
        Ok(CanonicalValue::Object(outer))
    }
}

/// Accepts strings (and integers rendered as strings, as serde_json does);
/// every other key kind is rejected.
struct MapKeySerializer;

fn key_error(kind: &'static str) -> CanonicalizationError {
    CanonicalizationError::NonStringKey { kind }
}

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = CanonicalizationError;
    type SerializeSeq = Impossible<String, CanonicalizationError>;
    type SerializeTuple = Impossible<String, CanonicalizationError>;
    type SerializeTupleStruct = Impossible<String, CanonicalizationError>;
    type SerializeTupleVariant = Impossible<String, CanonicalizationError>;
    type SerializeMap = Impossible<String, CanonicalizationError>;
    type SerializeStruct = Impossible<String, CanonicalizationError>;
    type SerializeStructVariant = Impossible<String, CanonicalizationError>;

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_owned())
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<String> {
        Err(key_error("boolean"))
    }

    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(key_error("float"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(key_error("float"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(key_error("bytes"))
    }

    fn serialize_none(self) -> Result<String> {
        Err(key_error("null"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> Result<String> {
        Err(key_error("option"))
    }

    fn serialize_unit(self) -> Result<String> {
        Err(key_error("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(key_error("unit struct"))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(key_error("enum variant"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_error("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_error("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(key_error("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_error("enum variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_error("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_error("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_error("enum variant"))
    }
}
