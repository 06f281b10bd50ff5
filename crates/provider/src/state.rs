//! Terraform State Management
//!
//! Handles encoding and decoding of Terraform dynamic values. Terraform sends
//! msgpack on every RPC; JSON only appears in stored state being upgraded.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use rmpv::Value as Msgpack;

/// Msgpack extension type Terraform uses to mark unknown values
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Dynamic value that can be encoded/decoded from Terraform state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    /// Known only after apply
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(BTreeMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers too large for an integer arrive as strings
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            DynamicValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => n.as_f64(),
            DynamicValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    /// Set an attribute; no-op unless this is a map
    pub fn set(&mut self, key: &str, value: DynamicValue) {
        if let DynamicValue::Map(m) = self {
            m.insert(key.to_string(), value);
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    /// True when neither this value nor anything inside it is unknown
    pub fn is_wholly_known(&self) -> bool {
        match self {
            DynamicValue::Unknown => false,
            DynamicValue::List(l) => l.iter().all(DynamicValue::is_wholly_known),
            DynamicValue::Map(m) => m.values().all(DynamicValue::is_wholly_known),
            _ => true,
        }
    }

    /// Null, unknown, empty string, empty collection
    pub fn is_empty(&self) -> bool {
        match self {
            DynamicValue::Null | DynamicValue::Unknown => true,
            DynamicValue::String(s) => s.is_empty(),
            DynamicValue::List(l) => l.is_empty(),
            DynamicValue::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DynamicValue::Null,
            serde_json::Value::Bool(b) => DynamicValue::Bool(b),
            serde_json::Value::Number(n) => DynamicValue::Number(n),
            serde_json::Value::String(s) => DynamicValue::String(s),
            serde_json::Value::Array(a) => {
                DynamicValue::List(a.into_iter().map(DynamicValue::from_json).collect())
            }
            serde_json::Value::Object(o) => DynamicValue::Map(
                o.into_iter()
                    .map(|(k, v)| (k, DynamicValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Unknown values have no JSON form and become null
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DynamicValue::Null | DynamicValue::Unknown => serde_json::Value::Null,
            DynamicValue::Bool(b) => serde_json::Value::Bool(*b),
            DynamicValue::Number(n) => serde_json::Value::Number(n.clone()),
            DynamicValue::String(s) => serde_json::Value::String(s.clone()),
            DynamicValue::List(l) => serde_json::Value::Array(l.iter().map(|v| v.to_json()).collect()),
            DynamicValue::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    fn from_msgpack(value: Msgpack) -> Result<Self> {
        Ok(match value {
            Msgpack::Nil => DynamicValue::Null,
            Msgpack::Boolean(b) => DynamicValue::Bool(b),
            Msgpack::Integer(i) => match (i.as_i64(), i.as_u64()) {
                (Some(n), _) => int_value(n),
                (None, Some(n)) => DynamicValue::Number(serde_json::Number::from(n)),
                _ => return Err(anyhow!("integer out of range")),
            },
            Msgpack::F32(f) => float_value(f as f64),
            Msgpack::F64(f) => float_value(f),
            Msgpack::String(s) => match s.into_str() {
                Some(s) => DynamicValue::String(s),
                None => return Err(anyhow!("string is not valid UTF-8")),
            },
            Msgpack::Binary(b) => DynamicValue::String(String::from_utf8(b)?),
            Msgpack::Array(items) => DynamicValue::List(
                items
                    .into_iter()
                    .map(DynamicValue::from_msgpack)
                    .collect::<Result<_>>()?,
            ),
            Msgpack::Map(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    let key = match k {
                        Msgpack::String(s) => s
                            .into_str()
                            .ok_or_else(|| anyhow!("map key is not valid UTF-8"))?,
                        other => return Err(anyhow!("unsupported map key {}", other)),
                    };
                    map.insert(key, DynamicValue::from_msgpack(v)?);
                }
                DynamicValue::Map(map)
            }
            Msgpack::Ext(UNKNOWN_EXT_TYPE, _) => DynamicValue::Unknown,
            Msgpack::Ext(t, _) => return Err(anyhow!("unsupported msgpack extension type {}", t)),
        })
    }

    fn to_msgpack(&self) -> Msgpack {
        match self {
            DynamicValue::Null => Msgpack::Nil,
            DynamicValue::Unknown => Msgpack::Ext(UNKNOWN_EXT_TYPE, vec![0]),
            DynamicValue::Bool(b) => Msgpack::Boolean(*b),
            DynamicValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Msgpack::from(i)
                } else if let Some(u) = n.as_u64() {
                    Msgpack::from(u)
                } else {
                    let f = n.as_f64().unwrap_or_default();
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Msgpack::from(f as i64)
                    } else {
                        Msgpack::F64(f)
                    }
                }
            }
            DynamicValue::String(s) => Msgpack::from(s.as_str()),
            DynamicValue::List(l) => Msgpack::Array(l.iter().map(|v| v.to_msgpack()).collect()),
            DynamicValue::Map(m) => Msgpack::Map(
                m.iter()
                    .map(|(k, v)| (Msgpack::from(k.as_str()), v.to_msgpack()))
                    .collect(),
            ),
        }
    }
}

/// Decode a Terraform DynamicValue from msgpack bytes
pub fn decode_dynamic_value(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }

    let mut reader = data;
    let value = rmpv::decode::read_value(&mut reader)?;
    DynamicValue::from_msgpack(value)
}

/// Encode a value to Terraform DynamicValue msgpack bytes
pub fn encode_dynamic_value(value: &DynamicValue) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &value.to_msgpack())?;
    Ok(bytes)
}

/// Decode JSON state as written by an earlier provider version
pub fn decode_json_state(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    Ok(DynamicValue::from_json(serde_json::from_slice(data)?))
}

/// Replace every unknown value with null, used once apply has finished
pub fn strip_unknown(value: DynamicValue) -> DynamicValue {
    match value {
        DynamicValue::Unknown => DynamicValue::Null,
        DynamicValue::List(l) => DynamicValue::List(l.into_iter().map(strip_unknown).collect()),
        DynamicValue::Map(m) => {
            DynamicValue::Map(m.into_iter().map(|(k, v)| (k, strip_unknown(v))).collect())
        }
        other => other,
    }
}

/// Helper to extract a string attribute from a DynamicValue
pub fn get_string_attr(value: &DynamicValue, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_string())
        .unwrap_or("")
        .to_string()
}

/// Helper to extract an optional string attribute from a DynamicValue
pub fn get_optional_string_attr(value: &DynamicValue, key: &str) -> Option<String> {
    value.get(key).and_then(|v| match v {
        DynamicValue::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// Helper to extract an integer attribute from a DynamicValue
pub fn get_int_attr(value: &DynamicValue, key: &str, default: i64) -> i64 {
    value.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

pub fn get_optional_int_attr(value: &DynamicValue, key: &str) -> Option<i64> {
    value.get(key).and_then(|v| v.as_i64())
}

/// Helper to extract a float attribute from a DynamicValue
pub fn get_float_attr(value: &DynamicValue, key: &str, default: f64) -> f64 {
    value.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

/// Helper to extract a bool attribute from a DynamicValue
pub fn get_bool_attr(value: &DynamicValue, key: &str, default: bool) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Elements of a list or set attribute; empty when unset
pub fn get_list_attr<'a>(value: &'a DynamicValue, key: &str) -> &'a [DynamicValue] {
    value.get(key).and_then(|v| v.as_list()).unwrap_or(&[])
}

pub fn get_string_list_attr(value: &DynamicValue, key: &str) -> Vec<String> {
    get_list_attr(value, key)
        .iter()
        .filter_map(|v| v.as_string().map(str::to_string))
        .collect()
}

pub fn get_int_list_attr(value: &DynamicValue, key: &str) -> Vec<i64> {
    get_list_attr(value, key).iter().filter_map(|v| v.as_i64()).collect()
}

/// Map-of-strings attribute such as `tags`
pub fn get_string_map_attr(value: &DynamicValue, key: &str) -> BTreeMap<String, String> {
    value
        .get(key)
        .and_then(|v| v.as_map())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_string().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// The single element of a block limited to one item
pub fn get_block<'a>(value: &'a DynamicValue, key: &str) -> Option<&'a DynamicValue> {
    get_list_attr(value, key).first()
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = BTreeMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// String or null
pub fn optional_string_value(s: Option<impl Into<String>>) -> DynamicValue {
    s.map(string_value).unwrap_or(DynamicValue::Null)
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Create a number DynamicValue from f64
pub fn float_value(n: f64) -> DynamicValue {
    serde_json::Number::from_f64(n)
        .map(DynamicValue::Number)
        .unwrap_or(DynamicValue::Null)
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}

/// Create a null DynamicValue
pub fn null_value() -> DynamicValue {
    DynamicValue::Null
}

pub fn list_value(items: Vec<DynamicValue>) -> DynamicValue {
    DynamicValue::List(items)
}

pub fn string_list_value<I, S>(items: I) -> DynamicValue
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    DynamicValue::List(items.into_iter().map(string_value).collect())
}

pub fn string_map_value(map: &BTreeMap<String, String>) -> DynamicValue {
    DynamicValue::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), string_value(v.clone())))
            .collect(),
    )
}
