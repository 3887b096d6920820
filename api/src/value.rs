// COVENANT: Ledger-backed lifecycle engine for smart, Ricardian and marketplace contracts
//
// SPDX-License-Identifier: Apache-2.0
//
// Copyright (C) 2024-2025 COVENANT contributors.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

use alloc::collections::BTreeMap;
use core::fmt::{self, Display, Formatter};

use amplify::hex::ToHex;

/// Key-value mapping used for contract state, call parameters and call results.
pub type StateMap = BTreeMap<String, Value>;

/// Dynamically-typed payload of contract state, parameters and results.
///
/// With the `serde` feature the value is serialized untagged, so YAML or JSON documents map onto
/// it naturally. Byte strings are represented as a single-key map `{$bytes: <hex>}`; map keys
/// starting with `$` are written with one more `$` prepended, so no ordinary map can be read back
/// as a byte string.
#[derive(Clone, PartialEq, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Blob),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(blob) => Some(&blob.bytes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Name of the value variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => Display::fmt(v, f),
            Value::Int(v) => Display::fmt(v, f),
            Value::Float(v) => Display::fmt(v, f),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(blob) => write!(f, "0x{}", blob.bytes.to_hex()),
            Value::List(list) => {
                f.write_str("[")?;
                for (no, item) in list.iter().enumerate() {
                    if no > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(item, f)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (no, (key, item)) in map.iter().enumerate() {
                    if no > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v as i64) }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self { Value::Int(v as i64) }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_owned()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}
impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self { Value::Bytes(Blob { bytes }) }
}
impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self { Value::List(list) }
}
impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self { Value::Map(map) }
}

/// Binary payload inside a [`Value`].
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Blob {
    pub bytes: Vec<u8>,
}

#[cfg(feature = "serde")]
mod _serde {
    use amplify::hex::FromHex;
    use serde::de::{self, MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::*;

    /// Key of the single-entry map carrying a hex-encoded byte string.
    pub const BYTES_KEY: &str = "$bytes";
    /// Prefix of keys which are reserved for the encoding and must be escaped in ordinary maps.
    pub const ESCAPE: char = '$';

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(v) => serializer.serialize_bool(*v),
                Value::Int(v) => serializer.serialize_i64(*v),
                Value::Float(v) => serializer.serialize_f64(*v),
                Value::Str(s) => serializer.serialize_str(s),
                Value::Bytes(blob) => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(BYTES_KEY, &blob.bytes.to_hex())?;
                    map.end()
                }
                Value::List(list) => {
                    let mut seq = serializer.serialize_seq(Some(list.len()))?;
                    for item in list {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Value::Map(items) => {
                    let mut map = serializer.serialize_map(Some(items.len()))?;
                    for (key, item) in items {
                        if key.starts_with(ESCAPE) {
                            map.serialize_entry(&format!("{ESCAPE}{key}"), item)?;
                        } else {
                            map.serialize_entry(key, item)?;
                        }
                    }
                    map.end()
                }
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut Formatter) -> fmt::Result { f.write_str("a contract value") }

        fn visit_unit<E: de::Error>(self) -> Result<Value, E> { Ok(Value::Null) }

        fn visit_none<E: de::Error>(self) -> Result<Value, E> { Ok(Value::Null) }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
            Value::deserialize(deserializer)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> { Ok(Value::Bool(v)) }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> { Ok(Value::Int(v)) }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
            Ok(i64::try_from(v).map(Value::Int).unwrap_or(Value::Float(v as f64)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> { Ok(Value::Float(v)) }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> { Ok(Value::Str(v.to_owned())) }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> { Ok(Value::Str(v)) }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> { Ok(Value::from(v.to_vec())) }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut list = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            while let Some(item) = seq.next_element()? {
                list.push(item);
            }
            Ok(Value::List(list))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
            let mut raw = Vec::<(String, Value)>::new();
            while let Some(entry) = access.next_entry()? {
                raw.push(entry);
            }
            if let [(key, item)] = raw.as_slice() {
                if key == BYTES_KEY {
                    let Value::Str(hex) = item else {
                        return Err(de::Error::custom("byte string must be hex-encoded"));
                    };
                    let bytes = Vec::<u8>::from_hex(hex).map_err(de::Error::custom)?;
                    return Ok(Value::from(bytes));
                }
            }
            let mut map = BTreeMap::new();
            for (key, item) in raw {
                let key = match key.strip_prefix(ESCAPE) {
                    Some(rest) if rest.starts_with(ESCAPE) => rest.to_owned(),
                    _ => key,
                };
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format!("duplicate map key `{key}`")));
                }
                map.insert(key, item);
            }
            Ok(Value::Map(map))
        }
    }
}

#[cfg(feature = "serde")]
pub(crate) mod hex_bytes {
    use amplify::hex::{FromHex, ToHex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bytes.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Vec::<u8>::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
