//! Owned, dynamically typed argument values.

use dbus_signature::{BasicType, Signature, SingleType};
use serde_derive::{Deserialize, Serialize};

use crate::types::{BasicValue, ObjectPath, UnixFd, WireType};

/// One argument of any D-Bus type.
///
/// Containers carry their element types so that empty arrays and
/// dictionaries still have a signature. In serde formats a value is tagged
/// with its type name:
///
/// ```
/// use dbus_marshal::Value;
///
/// let args: Vec<Value> = serde_json::from_str(
///     r#"[{"type": "int32", "value": -5}, {"type": "uint32", "value": 100}]"#,
/// ).unwrap();
/// assert_eq!(args, vec![Value::Int32(-5), Value::Uint32(100)]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    UnixFd(UnixFd),
    Array {
        element: SingleType,
        items: Vec<Value>,
    },
    Struct(Vec<Value>),
    Variant(Box<Value>),
    Dict {
        key: BasicType,
        value: SingleType,
        entries: Vec<(Value, Value)>,
    },
}

impl Value {
    pub fn wire_type(&self) -> WireType {
        if let Some(b) = self.as_basic() {
            return b.wire_type();
        }
        match self {
            Value::Array { .. } | Value::Dict { .. } => WireType::Array,
            Value::Struct(_) => WireType::Struct,
            _ => WireType::Variant,
        }
    }

    /// The complete type of this value.
    pub fn signature(&self) -> SingleType {
        if let Some(b) = self.as_basic() {
            return SingleType::Basic(b.basic_type());
        }
        match self {
            Value::Array { element, .. } => SingleType::Array(Box::new(element.clone())),
            Value::Dict { key, value, .. } => SingleType::Dict(*key, Box::new(value.clone())),
            Value::Struct(fields) => {
                SingleType::Struct(fields.iter().map(Value::signature).collect())
            }
            _ => SingleType::Variant,
        }
    }

    pub fn as_basic(&self) -> Option<BasicValue<'_>> {
        let b = match self {
            Value::Byte(v) => BasicValue::Byte(*v),
            Value::Boolean(v) => BasicValue::Boolean(*v),
            Value::Int16(v) => BasicValue::Int16(*v),
            Value::Uint16(v) => BasicValue::Uint16(*v),
            Value::Int32(v) => BasicValue::Int32(*v),
            Value::Uint32(v) => BasicValue::Uint32(*v),
            Value::Int64(v) => BasicValue::Int64(*v),
            Value::Uint64(v) => BasicValue::Uint64(*v),
            Value::Double(v) => BasicValue::Double(*v),
            Value::String(v) => BasicValue::String(v),
            Value::ObjectPath(v) => BasicValue::ObjectPath(v.as_str()),
            Value::Signature(v) => BasicValue::Signature(v.as_str()),
            Value::UnixFd(v) => BasicValue::UnixFd(v.0),
            Value::Array { .. } | Value::Struct(_) | Value::Variant(_) | Value::Dict { .. } => {
                return None
            }
        };
        Some(b)
    }

    /// An array of `items` whose element type is taken from `element`.
    pub fn array<I>(element: SingleType, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Array {
            element,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn variant<V: Into<Value>>(inner: V) -> Self {
        Value::Variant(Box::new(inner.into()))
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    u8 => Byte,
    bool => Boolean,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    f64 => Double,
    String => String,
    ObjectPath => ObjectPath,
    Signature => Signature,
    UnixFd => UnixFd,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}
