//! Wire type tags and the basic values that travel behind them.

use std::fmt;

use dbus_signature::{BasicType, Signature};
use serde_derive::{Deserialize, Serialize};

use crate::{Error, Result};

/// The closed set of D-Bus wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    /// Terminates an argument list; never written as a value.
    Invalid,
    Byte,
    Boolean,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Double,
    String,
    ObjectPath,
    Signature,
    UnixFd,
    Array,
    Struct,
    Variant,
    DictEntry,
}

impl WireType {
    /// The ASCII tag, `0` for [`WireType::Invalid`].
    pub const fn code(self) -> u8 {
        match self {
            WireType::Invalid => 0,
            WireType::Byte => b'y',
            WireType::Boolean => b'b',
            WireType::Int16 => b'n',
            WireType::Uint16 => b'q',
            WireType::Int32 => b'i',
            WireType::Uint32 => b'u',
            WireType::Int64 => b'x',
            WireType::Uint64 => b't',
            WireType::Double => b'd',
            WireType::String => b's',
            WireType::ObjectPath => b'o',
            WireType::Signature => b'g',
            WireType::UnixFd => b'h',
            WireType::Array => b'a',
            WireType::Struct => b'r',
            WireType::Variant => b'v',
            WireType::DictEntry => b'e',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let t = match code {
            0 => WireType::Invalid,
            b'a' => WireType::Array,
            b'r' | b'(' => WireType::Struct,
            b'v' => WireType::Variant,
            b'e' | b'{' => WireType::DictEntry,
            c => BasicType::from_code(char::from(c))?.into(),
        };
        Some(t)
    }

    pub const fn alignment(self) -> usize {
        match self {
            WireType::Invalid | WireType::Byte | WireType::Signature | WireType::Variant => 1,
            WireType::Int16 | WireType::Uint16 => 2,
            WireType::Boolean
            | WireType::Int32
            | WireType::Uint32
            | WireType::UnixFd
            | WireType::String
            | WireType::ObjectPath
            | WireType::Array => 4,
            WireType::Int64
            | WireType::Uint64
            | WireType::Double
            | WireType::Struct
            | WireType::DictEntry => 8,
        }
    }

    pub const fn is_basic(self) -> bool {
        !matches!(
            self,
            WireType::Invalid
                | WireType::Array
                | WireType::Struct
                | WireType::Variant
                | WireType::DictEntry
        )
    }

    pub const fn is_container(self) -> bool {
        matches!(
            self,
            WireType::Array | WireType::Struct | WireType::Variant | WireType::DictEntry
        )
    }

    pub fn as_basic(self) -> Option<BasicType> {
        let b = match self {
            WireType::Byte => BasicType::Byte,
            WireType::Boolean => BasicType::Boolean,
            WireType::Int16 => BasicType::Int16,
            WireType::Uint16 => BasicType::Uint16,
            WireType::Int32 => BasicType::Int32,
            WireType::Uint32 => BasicType::Uint32,
            WireType::Int64 => BasicType::Int64,
            WireType::Uint64 => BasicType::Uint64,
            WireType::Double => BasicType::Double,
            WireType::String => BasicType::String,
            WireType::ObjectPath => BasicType::ObjectPath,
            WireType::Signature => BasicType::Signature,
            WireType::UnixFd => BasicType::UnixFd,
            _ => return None,
        };
        Some(b)
    }
}

impl From<BasicType> for WireType {
    fn from(b: BasicType) -> Self {
        match b {
            BasicType::Byte => WireType::Byte,
            BasicType::Boolean => WireType::Boolean,
            BasicType::Int16 => WireType::Int16,
            BasicType::Uint16 => WireType::Uint16,
            BasicType::Int32 => WireType::Int32,
            BasicType::Uint32 => WireType::Uint32,
            BasicType::Int64 => WireType::Int64,
            BasicType::Uint64 => WireType::Uint64,
            BasicType::Double => WireType::Double,
            BasicType::String => WireType::String,
            BasicType::ObjectPath => WireType::ObjectPath,
            BasicType::Signature => WireType::Signature,
            BasicType::UnixFd => WireType::UnixFd,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireType::Invalid => f.write_str("INVALID"),
            t => write!(f, "{}", char::from(t.code())),
        }
    }
}

/// Containers a collaborator can open under an iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Struct,
    Variant,
    DictEntry,
}

impl ContainerKind {
    pub const fn wire_type(self) -> WireType {
        match self {
            ContainerKind::Array => WireType::Array,
            ContainerKind::Struct => WireType::Struct,
            ContainerKind::Variant => WireType::Variant,
            ContainerKind::DictEntry => WireType::DictEntry,
        }
    }
}

/// A borrowed basic value; the variant is its wire tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BasicValue<'a> {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(&'a str),
    ObjectPath(&'a str),
    Signature(&'a str),
    UnixFd(u32),
}

impl BasicValue<'_> {
    pub fn basic_type(&self) -> BasicType {
        match self {
            BasicValue::Byte(_) => BasicType::Byte,
            BasicValue::Boolean(_) => BasicType::Boolean,
            BasicValue::Int16(_) => BasicType::Int16,
            BasicValue::Uint16(_) => BasicType::Uint16,
            BasicValue::Int32(_) => BasicType::Int32,
            BasicValue::Uint32(_) => BasicType::Uint32,
            BasicValue::Int64(_) => BasicType::Int64,
            BasicValue::Uint64(_) => BasicType::Uint64,
            BasicValue::Double(_) => BasicType::Double,
            BasicValue::String(_) => BasicType::String,
            BasicValue::ObjectPath(_) => BasicType::ObjectPath,
            BasicValue::Signature(_) => BasicType::Signature,
            BasicValue::UnixFd(_) => BasicType::UnixFd,
        }
    }

    pub fn wire_type(&self) -> WireType {
        self.basic_type().into()
    }

    /// Checks that the value can be represented on the wire.
    pub fn validate(&self) -> Result<()> {
        match *self {
            BasicValue::String(s) if s.contains('\0') => Err(Error::InvalidValue {
                wire_type: WireType::String,
                reason: "string contains a NUL byte".into(),
            }),
            BasicValue::ObjectPath(p) if !is_valid_object_path(p) => Err(Error::InvalidValue {
                wire_type: WireType::ObjectPath,
                reason: format!("'{}' is not a valid object path", p),
            }),
            BasicValue::Signature(s) => Signature::parse(s).map(drop).map_err(Error::from),
            _ => Ok(()),
        }
    }
}

/// Rust types that map onto exactly one basic wire type.
pub trait Basic {
    const BASIC_TYPE: BasicType;

    fn as_basic(&self) -> BasicValue<'_>;
}

macro_rules! impl_basic {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Basic for $t {
                const BASIC_TYPE: BasicType = BasicType::$variant;

                fn as_basic(&self) -> BasicValue<'_> {
                    BasicValue::$variant(*self)
                }
            }
        )*
    };
}

impl_basic! {
    u8 => Byte,
    bool => Boolean,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    f64 => Double,
}

impl Basic for &str {
    const BASIC_TYPE: BasicType = BasicType::String;

    fn as_basic(&self) -> BasicValue<'_> {
        BasicValue::String(*self)
    }
}

impl Basic for String {
    const BASIC_TYPE: BasicType = BasicType::String;

    fn as_basic(&self) -> BasicValue<'_> {
        BasicValue::String(self.as_str())
    }
}

impl Basic for ObjectPath {
    const BASIC_TYPE: BasicType = BasicType::ObjectPath;

    fn as_basic(&self) -> BasicValue<'_> {
        BasicValue::ObjectPath(&self.0)
    }
}

impl Basic for Signature {
    const BASIC_TYPE: BasicType = BasicType::Signature;

    fn as_basic(&self) -> BasicValue<'_> {
        BasicValue::Signature(self.as_str())
    }
}

impl Basic for UnixFd {
    const BASIC_TYPE: BasicType = BasicType::UnixFd;

    fn as_basic(&self) -> BasicValue<'_> {
        BasicValue::UnixFd(self.0)
    }
}

/// Index into the out-of-band file descriptor list of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixFd(pub u32);

/// A validated object path such as `/org/freedesktop/DBus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new<S: Into<String>>(path: S) -> Result<Self> {
        let path = path.into();
        if is_valid_object_path(&path) {
            Ok(ObjectPath(path))
        } else {
            Err(Error::InvalidValue {
                wire_type: WireType::ObjectPath,
                reason: format!("'{}' is not a valid object path", path),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = Error;

    fn try_from(path: String) -> Result<Self> {
        ObjectPath::new(path)
    }
}

impl TryFrom<&str> for ObjectPath {
    type Error = Error;

    fn try_from(path: &str) -> Result<Self> {
        ObjectPath::new(path)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

/// `/`, or `/`-separated non-empty elements of `[A-Za-z0-9_]` without a trailing `/`.
pub fn is_valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    match path.strip_prefix('/') {
        Some(rest) => rest.split('/').all(|element| {
            !element.is_empty()
                && element
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }),
        None => false,
    }
}
