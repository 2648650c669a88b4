// Scalar option values and their canonical string form
//
// User-supplied mount options arrive as loosely typed scalars (from JSON,
// TOML, CLI flags). Everything downstream works on strings, so this module
// owns the single conversion point.

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Keys whose boolean values render as `1`/`0` instead of `true`/`false`.
pub const DEFAULT_FLAG_KEYS: &[&str] = &["auto-traverse-mounts", "dircache"];

/// A single user-supplied option value before coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    /// Null, nested structures, or anything else without a scalar form.
    #[default]
    Unsupported,
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for OptionValue {
            fn from(value: $t) -> Self {
                OptionValue::Integer(i64::from(value))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for OptionValue {
            fn from(value: $t) -> Self {
                OptionValue::Unsigned(u64::from(value))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for OptionValue {
    fn from(value: isize) -> Self {
        OptionValue::Integer(value as i64)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Unsigned(value as u64)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        // Widening 0.1f32 directly yields 0.10000000149011612; go through the
        // shortest f32 representation instead.
        let widened = value.to_string().parse::<f64>().unwrap_or_else(|_| f64::from(value));
        OptionValue::Float(widened)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(OptionValue::Unsupported)
    }
}

impl Serialize for OptionValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OptionValue::String(s) => serializer.serialize_str(s),
            OptionValue::Integer(i) => serializer.serialize_i64(*i),
            OptionValue::Unsigned(u) => serializer.serialize_u64(*u),
            OptionValue::Float(f) => serializer.serialize_f64(*f),
            OptionValue::Bool(b) => serializer.serialize_bool(*b),
            OptionValue::Unsupported => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(OptionValueVisitor)
    }
}

struct OptionValueVisitor;

impl<'de> Visitor<'de> for OptionValueVisitor {
    type Value = OptionValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mount option value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<OptionValue, E> {
        Ok(OptionValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<OptionValue, E> {
        Ok(OptionValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<OptionValue, E> {
        // Keep small unsigned values in the signed variant so equality with
        // hand-built values does not depend on the source format.
        Ok(i64::try_from(v).map(OptionValue::Integer).unwrap_or(OptionValue::Unsigned(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<OptionValue, E> {
        Ok(OptionValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OptionValue, E> {
        Ok(OptionValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<OptionValue, E> {
        Ok(OptionValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<OptionValue, E> {
        Ok(OptionValue::Unsupported)
    }

    fn visit_none<E: de::Error>(self) -> Result<OptionValue, E> {
        Ok(OptionValue::Unsupported)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<OptionValue, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OptionValue, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(OptionValue::Unsupported)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<OptionValue, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(OptionValue::Unsupported)
    }
}

/// Converts option values to strings, honoring the flag-key convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coercer {
    flag_keys: BTreeSet<String>,
}

impl Default for Coercer {
    fn default() -> Self {
        Self::with_flag_keys(DEFAULT_FLAG_KEYS.iter().copied())
    }
}

impl Coercer {
    pub fn with_flag_keys<I, S>(flag_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { flag_keys: flag_keys.into_iter().map(Into::into).collect() }
    }

    pub fn flag_keys(&self) -> &BTreeSet<String> {
        &self.flag_keys
    }

    pub fn is_flag_key(&self, key: &str) -> bool {
        self.flag_keys.contains(key)
    }

    /// Render `value` as the canonical string for `key`. Never fails.
    pub fn coerce(&self, value: &OptionValue, key: &str) -> String {
        match value {
            OptionValue::String(s) => s.clone(),
            OptionValue::Integer(i) => i.to_string(),
            OptionValue::Unsigned(u) => u.to_string(),
            OptionValue::Float(f) => f.to_string(),
            OptionValue::Bool(true) if self.is_flag_key(key) => "1".to_string(),
            OptionValue::Bool(false) if self.is_flag_key(key) => "0".to_string(),
            OptionValue::Bool(b) => b.to_string(),
            OptionValue::Unsupported => String::new(),
        }
    }
}

/// Coerce with the default flag keys.
pub fn coerce_to_string(value: &OptionValue, key: &str) -> String {
    Coercer::default().coerce(value, key)
}

/// Parse a boolean literal the way mount configuration has always accepted
/// them: `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
