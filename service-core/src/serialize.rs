//! Conversion of typed values into JSON-safe trees.
//!
//! Values opt in through `serde::Serialize`; there is no attribute probing.
//! The conversion is driven by a dedicated serializer that only ever emits
//! JSON primitives, arrays and objects, and rejects what JSON cannot hold
//! (raw bytes, composite map keys, non-finite floats) with a
//! [`SerializationError`] naming the offending type.
//!
//! Per-type rules:
//! - URL newtypes ([`HttpUrl`], [`RedisDsn`], [`WebsocketUrl`]) render as
//!   strings with every leading and trailing `/` removed.
//! - Unit enum variants render as their (serde-renamed) tag. Enums that
//!   need an integer value implement `Serialize` as that integer.
//! - `chrono` dates, times and datetimes render as ISO-8601 strings.
//! - `Uuid` renders as its hyphenated string; [`SecretStr`] renders masked.
//! - Sets render as arrays. `HashSet` iteration order is unspecified, so the
//!   element order of the resulting array is implementation-defined; use
//!   `BTreeSet` where a stable order matters.
//! - Maps keep their iteration order (`serde_json` is built with
//!   `preserve_order`).

use secrecy::{ExposeSecret, SecretString};
use serde::ser::{self, Serialize};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::{Map, Number, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use url::Url;

/// A value could not be rendered as JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Object of type {type_name} is not serializable: {reason}")]
pub struct SerializationError {
    pub type_name: String,
    pub reason: String,
}

impl SerializationError {
    fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            type_name: String::new(),
            reason: reason.into(),
        }
    }

    fn within(mut self, type_name: &str) -> Self {
        if self.type_name.is_empty() {
            self.type_name = type_name.to_string();
        }
        self
    }
}

impl ser::Error for SerializationError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::unsupported(msg.to_string())
    }
}

type Conversion = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;

/// Caller supplied conversions keyed by concrete type.
///
/// Overrides only apply to the value handed to [`serialize`] itself, not to
/// values nested inside it.
#[derive(Default)]
pub struct Overrides {
    rules: HashMap<TypeId, Conversion>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T, F>(mut self, convert: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.rules.insert(
            TypeId::of::<T>(),
            Box::new(move |value| value.downcast_ref::<T>().map(&convert)),
        );
        self
    }

    fn apply(&self, value: &dyn Any) -> Option<Value> {
        self.rules
            .get(&value.type_id())
            .and_then(|convert| convert(value))
    }
}

/// Serialize `value` into a JSON-safe tree, consulting `overrides` first.
pub fn serialize<T>(value: &T, overrides: Option<&Overrides>) -> Result<Value, SerializationError>
where
    T: Serialize + Any,
{
    if let Some(converted) = overrides.and_then(|o| o.apply(value)) {
        return Ok(converted);
    }
    to_json_safe(value)
}

/// Serialize `value` into a JSON-safe tree.
pub fn to_json_safe<T>(value: &T) -> Result<Value, SerializationError>
where
    T: Serialize + ?Sized,
{
    value
        .serialize(JsonSafe)
        .map_err(|e| e.within(std::any::type_name::<T>()))
}

macro_rules! url_type {
    ($(#[$meta:meta])* $name:ident, [$($scheme:literal),+]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(Url);

        impl $name {
            pub const SCHEMES: &'static [&'static str] = &[$($scheme),+];

            pub fn parse(raw: &str) -> Result<Self, UrlError> {
                Self::try_from(Url::parse(raw)?)
            }

            pub fn as_url(&self) -> &Url {
                &self.0
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl TryFrom<Url> for $name {
            type Error = UrlError;

            fn try_from(url: Url) -> Result<Self, Self::Error> {
                if Self::SCHEMES.contains(&url.scheme()) {
                    Ok(Self(url))
                } else {
                    Err(UrlError::Scheme {
                        expected: Self::SCHEMES.join("|"),
                        found: url.scheme().to_string(),
                    })
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.0.as_str().trim_matches('/'))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {found}, expected {expected}")]
    Scheme { expected: String, found: String },
}

url_type!(
    /// An `http`/`https` URL.
    HttpUrl,
    ["http", "https"]
);
url_type!(
    /// A Redis connection string.
    RedisDsn,
    ["redis", "rediss", "unix"]
);
url_type!(
    /// A websocket URL.
    WebsocketUrl,
    ["ws", "wss"]
);

/// A secret string that never serializes its content.
pub struct SecretStr(SecretString);

impl SecretStr {
    const MASK: &'static str = "**********";

    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Clone for SecretStr {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretStr({})", Self::MASK)
    }
}

impl fmt::Display for SecretStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::MASK)
    }
}

impl Serialize for SecretStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::MASK)
    }
}

impl<'de> Deserialize<'de> for SecretStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

struct JsonSafe;

fn number_from_f64(value: f64) -> Result<Value, SerializationError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| SerializationError::unsupported(format!("non-finite float {}", value)))
}

fn tagged(variant: &'static str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(variant.to_string(), value);
    Value::Object(map)
}

impl Serializer for JsonSafe {
    type Ok = Value;
    type Error = SerializationError;

    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = SeqSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = MapSerializer;

    fn serialize_bool(self, v: bool) -> Result<Value, Self::Error> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Self::Error> {
        i64::try_from(v)
            .map(Value::from)
            .map_err(|_| SerializationError::unsupported(format!("integer {} out of range", v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Self::Error> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Self::Error> {
        u64::try_from(v)
            .map(Value::from)
            .map_err(|_| SerializationError::unsupported(format!("integer {} out of range", v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Self::Error> {
        number_from_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Self::Error> {
        number_from_f64(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Self::Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Value, Self::Error> {
        Err(SerializationError::unsupported("raw bytes"))
    }

    fn serialize_none(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Self::Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, Self::Error> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        value.serialize(self).map_err(|e| e.within(name))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Self::Error> {
        let inner = value.serialize(self).map_err(|e| e.within(name))?;
        Ok(tagged(variant, inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqSerializer::new(None, None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(SeqSerializer::new(None, None, len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(SeqSerializer::new(Some(name), None, len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(SeqSerializer::new(Some(name), Some(variant), len))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer::new(None, None))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(MapSerializer::new(Some(name), None))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer::new(Some(name), Some(variant)))
    }
}

struct SeqSerializer {
    name: Option<&'static str>,
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl SeqSerializer {
    fn new(name: Option<&'static str>, variant: Option<&'static str>, len: usize) -> Self {
        Self {
            name,
            variant,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerializationError> {
        let item = value.serialize(JsonSafe).map_err(|e| match self.name {
            Some(name) => e.within(name),
            None => e,
        })?;
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> Value {
        let array = Value::Array(self.items);
        match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        }
    }
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

struct MapSerializer {
    name: Option<&'static str>,
    variant: Option<&'static str>,
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl MapSerializer {
    fn new(name: Option<&'static str>, variant: Option<&'static str>) -> Self {
        Self {
            name,
            variant,
            map: Map::new(),
            next_key: None,
        }
    }

    fn scoped(&self, error: SerializationError) -> SerializationError {
        match self.name {
            Some(name) => error.within(name),
            None => error,
        }
    }

    fn insert<T: ?Sized + Serialize>(
        &mut self,
        key: String,
        value: &T,
    ) -> Result<(), SerializationError> {
        let value = value.serialize(JsonSafe).map_err(|e| self.scoped(e))?;
        self.map.insert(key, value);
        Ok(())
    }

    fn finish(self) -> Value {
        let object = Value::Object(self.map);
        match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        }
    }
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        let key = key.serialize(MapKey).map_err(|e| self.scoped(e))?;
        self.next_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| SerializationError::unsupported("map value without a key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapSerializer {
    type Ok = Value;
    type Error = SerializationError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(self.finish())
    }
}

/// Map keys must collapse to strings; scalars are stringified.
struct MapKey;

impl MapKey {
    fn reject<T>() -> Result<T, SerializationError> {
        Err(SerializationError::unsupported("map key must be a string or scalar"))
    }
}

impl Serializer for MapKey {
    type Ok = String;
    type Error = SerializationError;

    type SerializeSeq = ser::Impossible<String, SerializationError>;
    type SerializeTuple = ser::Impossible<String, SerializationError>;
    type SerializeTupleStruct = ser::Impossible<String, SerializationError>;
    type SerializeTupleVariant = ser::Impossible<String, SerializationError>;
    type SerializeMap = ser::Impossible<String, SerializationError>;
    type SerializeStruct = ser::Impossible<String, SerializationError>;
    type SerializeStructVariant = ser::Impossible<String, SerializationError>;

    fn serialize_bool(self, v: bool) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_f64(self, _v: f64) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_char(self, v: char) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_none(self) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_unit(self) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, Self::Error> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, Self::Error> {
        Self::reject()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Self::reject()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Self::reject()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Self::reject()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Self::reject()
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Self::reject()
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Self::reject()
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Self::reject()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use serde::Serialize;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use uuid::Uuid;

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Color {
        DarkRed,
    }

    #[derive(Serialize)]
    struct Profile {
        name: String,
        color: Color,
        homepage: HttpUrl,
        tags: BTreeSet<String>,
        scores: Vec<(i32, f64)>,
        nickname: Option<String>,
    }

    struct Blob;

    impl Serialize for Blob {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_bytes(&[1, 2, 3])
        }
    }

    #[derive(Serialize)]
    struct Holder {
        blob: Blob,
    }

    fn assert_json_safe(value: &Value) {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
            Value::Array(items) => items.iter().for_each(assert_json_safe),
            Value::Object(map) => map.values().for_each(assert_json_safe),
        }
    }

    #[test]
    fn urls_lose_surrounding_slashes() {
        let url = HttpUrl::parse("https://example.org/").unwrap();
        assert_eq!(to_json_safe(&url).unwrap(), json!("https://example.org"));

        let dsn = RedisDsn::parse("redis://cache:6379/0").unwrap();
        assert_eq!(to_json_safe(&dsn).unwrap(), json!("redis://cache:6379/0"));

        let ws = WebsocketUrl::parse("wss://example.org/socket//").unwrap();
        assert_eq!(to_json_safe(&ws).unwrap(), json!("wss://example.org/socket"));
    }

    #[test]
    fn url_types_reject_foreign_schemes() {
        assert!(matches!(
            HttpUrl::parse("redis://cache:6379"),
            Err(UrlError::Scheme { .. })
        ));
        assert!(RedisDsn::parse("not a url").is_err());
    }

    #[test]
    fn scalars_and_identifiers_render_as_strings() {
        let id = Uuid::new_v4();
        assert_eq!(to_json_safe(&id).unwrap(), json!(id.to_string()));
        assert_eq!(to_json_safe(&Color::DarkRed).unwrap(), json!("dark_red"));
        assert_eq!(
            to_json_safe(&SecretStr::new("hunter2")).unwrap(),
            json!("**********")
        );

        let when = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(to_json_safe(&when).unwrap(), json!("2024-05-06T07:08:09Z"));
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(to_json_safe(&day).unwrap(), json!("2024-05-06"));
        let time = NaiveTime::from_hms_opt(7, 8, 9).unwrap();
        assert_eq!(to_json_safe(&time).unwrap(), json!("07:08:09"));
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(to_json_safe("text").unwrap(), json!("text"));
        assert_eq!(to_json_safe(&42_i64).unwrap(), json!(42));
        assert_eq!(to_json_safe(&1.5_f64).unwrap(), json!(1.5));
        assert_eq!(to_json_safe(&true).unwrap(), json!(true));
        assert_eq!(to_json_safe(&Option::<i32>::None).unwrap(), Value::Null);
    }

    #[test]
    fn records_serialize_recursively() {
        let profile = Profile {
            name: "ada".to_string(),
            color: Color::DarkRed,
            homepage: HttpUrl::parse("https://ada.dev/").unwrap(),
            tags: ["b".to_string(), "a".to_string()].into_iter().collect(),
            scores: vec![(1, 0.5)],
            nickname: None,
        };

        let value = to_json_safe(&profile).unwrap();
        assert_json_safe(&value);
        assert_eq!(
            value,
            json!({
                "name": "ada",
                "color": "dark_red",
                "homepage": "https://ada.dev",
                "tags": ["a", "b"],
                "scores": [[1, 0.5]],
                "nickname": null
            })
        );
    }

    #[test]
    fn maps_keep_insertion_order_and_stringify_scalar_keys() {
        let mut map = serde_json::Map::new();
        map.insert("z".to_string(), json!(1));
        map.insert("a".to_string(), json!(2));
        let value = to_json_safe(&map).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);

        let numbered: BTreeMap<u32, &str> = [(2, "two"), (1, "one")].into_iter().collect();
        assert_eq!(
            to_json_safe(&numbered).unwrap(),
            json!({"1": "one", "2": "two"})
        );
    }

    #[test]
    fn sets_become_arrays() {
        let set: HashSet<i32> = [3, 1, 2].into_iter().collect();
        let value = to_json_safe(&set).unwrap();
        let mut items: Vec<i64> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect();
        items.sort();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn overrides_apply_to_the_top_level_value_only() {
        let overrides = Overrides::new().with::<Uuid, _>(|_| json!("redacted"));
        let id = Uuid::new_v4();
        assert_eq!(serialize(&id, Some(&overrides)).unwrap(), json!("redacted"));

        let nested = vec![id];
        assert_eq!(
            serialize(&nested, Some(&overrides)).unwrap(),
            json!([id.to_string()])
        );
        assert_eq!(serialize(&id, None).unwrap(), json!(id.to_string()));
    }

    #[test]
    fn unsupported_values_name_their_type() {
        let err = to_json_safe(&Holder { blob: Blob }).unwrap_err();
        assert_eq!(err.type_name, "Holder");
        assert_eq!(err.reason, "raw bytes");

        let err = to_json_safe(&f64::NAN).unwrap_err();
        assert_eq!(err.type_name, "f64");

        let composite: BTreeMap<(i32, i32), i32> = [((1, 2), 3)].into_iter().collect();
        let err = to_json_safe(&composite).unwrap_err();
        assert!(err.type_name.contains("BTreeMap"));
        assert!(err.to_string().starts_with("Object of type"));
    }
}
