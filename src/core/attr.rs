//! Attribute values
//!
//! Attributes hold exactly four kinds of value. Anything else is turned away by
//! [`IntoAttrValue`] before a group is touched.

use crate::array::NdArray;
use crate::error::{ContainerError, Result};
use serde_json::{Map, Number, Value};

/// Typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Bytes(Vec<u8>),
    Double(f64),
    Long(i64),
}

impl AttrValue {
    /// Four-byte kind tag used in attribute records
    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            AttrValue::Text(_) => b"text",
            AttrValue::Bytes(_) => b"byte",
            AttrValue::Double(_) => b"doub",
            AttrValue::Long(_) => b"long",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttrValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Snapshot representation.
    ///
    /// Text and integers map onto plain JSON; doubles are written so they never
    /// read back as integers; bytes and non-finite doubles use a one-key object
    /// named after the record tag.
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::Long(l) => Value::Number(Number::from(*l)),
            AttrValue::Double(d) => match Number::from_f64(*d) {
                Some(n) => Value::Number(n),
                None => tagged("doub", Value::String(non_finite_name(*d).to_string())),
            },
            AttrValue::Bytes(b) => tagged(
                "byte",
                Value::Array(b.iter().map(|&x| Value::from(x)).collect()),
            ),
        }
    }

    /// Inverse of [`AttrValue::to_json`].
    pub fn from_json(name: &str, value: &Value) -> Result<Self> {
        let invalid = |reason: &str| ContainerError::InvalidAttribute {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match value {
            Value::String(s) => Ok(AttrValue::Text(s.clone())),
            Value::Number(n) => number_to_attr(n).ok_or_else(|| invalid("integer out of range")),
            Value::Object(obj) if obj.len() == 1 => {
                if let Some(Value::Array(items)) = obj.get("byte") {
                    let bytes = items
                        .iter()
                        .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                        .collect::<Option<Vec<u8>>>()
                        .ok_or_else(|| invalid("byte list holds a non-byte entry"))?;
                    return Ok(AttrValue::Bytes(bytes));
                }
                match obj.get("doub").and_then(Value::as_str) {
                    Some("NaN") => Ok(AttrValue::Double(f64::NAN)),
                    Some("inf") => Ok(AttrValue::Double(f64::INFINITY)),
                    Some("-inf") => Ok(AttrValue::Double(f64::NEG_INFINITY)),
                    _ => Err(invalid("unrecognised tagged value")),
                }
            }
            _ => Err(invalid("unsupported JSON value")),
        }
    }
}

fn tagged(tag: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), value);
    Value::Object(map)
}

fn non_finite_name(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    }
}

fn number_to_attr(n: &Number) -> Option<AttrValue> {
    if let Some(l) = n.as_i64() {
        Some(AttrValue::Long(l))
    } else if n.is_u64() {
        None
    } else {
        n.as_f64().map(AttrValue::Double)
    }
}

/// Conversion into an [`AttrValue`] that may refuse the value.
///
/// Implemented for the accepted Rust types and for dynamic inputs
/// (`serde_json::Value`, arrays) that have to be checked at run time.
pub trait IntoAttrValue {
    fn into_attr_value(self, name: &str) -> Result<AttrValue>;
}

impl IntoAttrValue for AttrValue {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(self)
    }
}

impl IntoAttrValue for String {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Text(self))
    }
}

impl IntoAttrValue for &str {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Text(self.to_string()))
    }
}

impl IntoAttrValue for Vec<u8> {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Bytes(self))
    }
}

impl IntoAttrValue for &[u8] {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Bytes(self.to_vec()))
    }
}

impl<const N: usize> IntoAttrValue for &[u8; N] {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Bytes(self.to_vec()))
    }
}

impl IntoAttrValue for f64 {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Double(self))
    }
}

impl IntoAttrValue for f32 {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Double(self as f64))
    }
}

impl IntoAttrValue for i64 {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Long(self))
    }
}

impl IntoAttrValue for i32 {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Long(self as i64))
    }
}

impl IntoAttrValue for u32 {
    fn into_attr_value(self, _name: &str) -> Result<AttrValue> {
        Ok(AttrValue::Long(self as i64))
    }
}

impl IntoAttrValue for u64 {
    fn into_attr_value(self, name: &str) -> Result<AttrValue> {
        i64::try_from(self)
            .map(AttrValue::Long)
            .map_err(|_| ContainerError::InvalidAttribute {
                name: name.to_string(),
                reason: format!("{} does not fit in a signed 64-bit integer", self),
            })
    }
}

/// Run-time type gate: strings and numbers only.
impl IntoAttrValue for Value {
    fn into_attr_value(self, name: &str) -> Result<AttrValue> {
        let reject = |kind: &str| ContainerError::InvalidAttribute {
            name: name.to_string(),
            reason: format!("{} values are not supported", kind),
        };

        match self {
            Value::String(s) => Ok(AttrValue::Text(s)),
            Value::Number(n) => number_to_attr(&n).ok_or_else(|| reject("unsigned 64-bit")),
            Value::Null => Err(reject("null")),
            Value::Bool(_) => Err(reject("boolean")),
            Value::Array(_) => Err(reject("list")),
            Value::Object(_) => Err(reject("object")),
        }
    }
}

/// Arrays belong in [`GroupMut::create_array`](crate::GroupMut::create_array).
impl IntoAttrValue for &NdArray {
    fn into_attr_value(self, name: &str) -> Result<AttrValue> {
        Err(ContainerError::InvalidAttribute {
            name: name.to_string(),
            reason: format!("array values ({}) are not attributes", self.dtype()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepted_rust_types() {
        assert_eq!("a".into_attr_value("x").unwrap(), AttrValue::Text("a".into()));
        assert_eq!(
            b"ab".into_attr_value("x").unwrap(),
            AttrValue::Bytes(vec![b'a', b'b'])
        );
        assert_eq!(1.5f64.into_attr_value("x").unwrap(), AttrValue::Double(1.5));
        assert_eq!(2i32.into_attr_value("x").unwrap(), AttrValue::Long(2));
        assert_eq!(
            (1u64 << 32).into_attr_value("x").unwrap(),
            AttrValue::Long(1 << 32)
        );
        assert!(u64::MAX.into_attr_value("x").is_err());
    }

    #[test]
    fn test_dynamic_gate() {
        assert_eq!(json!("s").into_attr_value("x").unwrap(), AttrValue::Text("s".into()));
        assert_eq!(json!(3).into_attr_value("x").unwrap(), AttrValue::Long(3));
        assert_eq!(json!(3.25).into_attr_value("x").unwrap(), AttrValue::Double(3.25));

        for rejected in [json!(null), json!(true), json!([1, 2]), json!({"a": 1})] {
            let err = rejected.into_attr_value("x").unwrap_err();
            assert!(matches!(err, ContainerError::InvalidAttribute { .. }));
        }
    }

    #[test]
    fn test_array_rejected() {
        let arr = NdArray::from_vec(vec![3], &[1i64, 2, 3]).unwrap();
        assert!((&arr).into_attr_value("x").is_err());
    }

    #[test]
    fn test_json_mapping_is_exact() {
        let values = vec![
            AttrValue::Text("héllo".into()),
            AttrValue::Bytes(vec![0, 255, 10]),
            AttrValue::Double(1.0),
            AttrValue::Double(-2.5e-300),
            AttrValue::Double(f64::INFINITY),
            AttrValue::Double(f64::NEG_INFINITY),
            AttrValue::Long(i64::MIN),
            AttrValue::Long(0),
        ];

        for value in values {
            let text = serde_json::to_string(&value.to_json()).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(AttrValue::from_json("k", &parsed).unwrap(), value, "{}", text);
        }

        let nan = AttrValue::Double(f64::NAN).to_json();
        let back = AttrValue::from_json("k", &nan).unwrap();
        assert!(back.as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_double_one_stays_double() {
        let text = serde_json::to_string(&AttrValue::Double(1.0).to_json()).unwrap();
        assert_eq!(text, "1.0");
    }

    #[test]
    fn test_from_json_rejects_unknown_shapes() {
        assert!(AttrValue::from_json("k", &json!(null)).is_err());
        assert!(AttrValue::from_json("k", &json!({"byte": [256]})).is_err());
        assert!(AttrValue::from_json("k", &json!({"other": 1})).is_err());
    }
}
