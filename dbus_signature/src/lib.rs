/*!
 dbus_signature crate for parsing [D-Bus](https://dbus.freedesktop.org/doc/dbus-specification.html)
 type signatures.

 A signature is a sequence of single complete types. Basic types are one type
 code, containers nest: `a` arrays, `(...)` structs, `a{kv}` dictionaries and
 `v` variants.

 # Examples

 ```rust
 use dbus_signature::{BasicType, Signature, SingleType};

 let sig = Signature::parse("a{sv}(ii)").unwrap();
 assert_eq!(sig.len(), 2);
 assert!(sig[0].is_dict());
 assert_eq!(sig[0].dict_key(), Some(BasicType::String));
 assert_eq!(sig[1], SingleType::parse("(ii)").unwrap());
 assert_eq!(sig.to_string(), "a{sv}(ii)");
 ```
!*/

use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use itertools::Itertools;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};


mod signature_grammar;

/// Maximum length of a signature string in bytes.
pub const MAX_SIGNATURE_LEN: usize = 255;

/// Maximum number of nested array type codes.
pub const MAX_ARRAY_DEPTH: usize = 32;

/// Maximum number of nested struct (and dict entry) parentheses.
pub const MAX_STRUCT_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("signature is {0} bytes long, at most {max} are allowed", max = MAX_SIGNATURE_LEN)]
    TooLong(usize),
    #[error("invalid signature '{signature}' at offset {offset}: expected {expected}")]
    Parse {
        signature: String,
        offset: usize,
        expected: String,
    },
    #[error("signature '{0}' nests arrays deeper than {max}", max = MAX_ARRAY_DEPTH)]
    ArrayTooDeep(String),
    #[error("signature '{0}' nests structs deeper than {max}", max = MAX_STRUCT_DEPTH)]
    StructTooDeep(String),
    #[error("'{0}' is not a single complete type")]
    NotSingle(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Types that occupy one type code and have no children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
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
}

impl BasicType {
    pub const ALL: [BasicType; 13] = [
        BasicType::Byte,
        BasicType::Boolean,
        BasicType::Int16,
        BasicType::Uint16,
        BasicType::Int32,
        BasicType::Uint32,
        BasicType::Int64,
        BasicType::Uint64,
        BasicType::Double,
        BasicType::String,
        BasicType::ObjectPath,
        BasicType::Signature,
        BasicType::UnixFd,
    ];

    /// The ASCII type code used in signatures.
    pub const fn code(self) -> char {
        match self {
            BasicType::Byte => 'y',
            BasicType::Boolean => 'b',
            BasicType::Int16 => 'n',
            BasicType::Uint16 => 'q',
            BasicType::Int32 => 'i',
            BasicType::Uint32 => 'u',
            BasicType::Int64 => 'x',
            BasicType::Uint64 => 't',
            BasicType::Double => 'd',
            BasicType::String => 's',
            BasicType::ObjectPath => 'o',
            BasicType::Signature => 'g',
            BasicType::UnixFd => 'h',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Wire alignment in bytes.
    ///
    /// Strings and object paths align to their `u32` length prefix, signatures
    /// to their `u8` length prefix.
    pub const fn alignment(self) -> usize {
        match self {
            BasicType::Byte | BasicType::Signature => 1,
            BasicType::Int16 | BasicType::Uint16 => 2,
            BasicType::Boolean
            | BasicType::Int32
            | BasicType::Uint32
            | BasicType::UnixFd
            | BasicType::String
            | BasicType::ObjectPath => 4,
            BasicType::Int64 | BasicType::Uint64 | BasicType::Double => 8,
        }
    }

    /// Whether values of this type have a fixed encoded width.
    pub const fn is_fixed(self) -> bool {
        !matches!(
            self,
            BasicType::String | BasicType::ObjectPath | BasicType::Signature
        )
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One complete type: a basic type or a fully closed container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SingleType {
    Basic(BasicType),
    Variant,
    Array(Box<SingleType>),
    /// `a{kv}`: an array of dict entries with a basic key.
    Dict(BasicType, Box<SingleType>),
    Struct(Vec<SingleType>),
}

impl SingleType {
    /// Parses exactly one complete type.
    pub fn parse(s: &str) -> Result<Self> {
        let sig = Signature::parse(s)?;
        let mut types = sig.types.into_iter();
        match (types.next(), types.next()) {
            (Some(t), None) => Ok(t),
            _ => Err(Error::NotSingle(s.into())),
        }
    }

    /// The leading type code: `a` for arrays and dictionaries, `(` for structs.
    pub fn code(&self) -> char {
        match self {
            SingleType::Basic(b) => b.code(),
            SingleType::Variant => 'v',
            SingleType::Array(_) | SingleType::Dict(..) => 'a',
            SingleType::Struct(_) => '(',
        }
    }

    pub fn alignment(&self) -> usize {
        match self {
            SingleType::Basic(b) => b.alignment(),
            SingleType::Variant => 1,
            SingleType::Array(_) | SingleType::Dict(..) => 4,
            SingleType::Struct(_) => 8,
        }
    }

    pub fn as_basic(&self) -> Option<BasicType> {
        match self {
            SingleType::Basic(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, SingleType::Basic(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SingleType::Array(_) | SingleType::Dict(..))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, SingleType::Dict(..))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, SingleType::Struct(_))
    }

    pub fn is_container(&self) -> bool {
        !self.is_basic()
    }

    /// Element type of a plain array.
    pub fn array_element(&self) -> Option<&SingleType> {
        match self {
            SingleType::Array(e) => Some(e),
            _ => None,
        }
    }

    pub fn struct_fields(&self) -> Option<&[SingleType]> {
        match self {
            SingleType::Struct(f) => Some(f),
            _ => None,
        }
    }

    pub fn dict_key(&self) -> Option<BasicType> {
        match self {
            SingleType::Dict(k, _) => Some(*k),
            _ => None,
        }
    }

    pub fn dict_value(&self) -> Option<&SingleType> {
        match self {
            SingleType::Dict(_, v) => Some(v),
            _ => None,
        }
    }

    /// Alignment of the first element of an array (or dict entry) of this type.
    pub fn element_alignment(&self) -> Option<usize> {
        match self {
            SingleType::Array(e) => Some(e.alignment()),
            SingleType::Dict(..) => Some(8),
            _ => None,
        }
    }

    /// Deepest array nesting and deepest struct nesting below and including `self`.
    fn depths(&self) -> (usize, usize) {
        match self {
            SingleType::Basic(_) | SingleType::Variant => (0, 0),
            SingleType::Array(e) => {
                let (a, s) = e.depths();
                (a + 1, s)
            }
            SingleType::Dict(_, v) => {
                let (a, s) = v.depths();
                (a + 1, s + 1)
            }
            SingleType::Struct(fields) => {
                let (a, s) = fields
                    .iter()
                    .map(SingleType::depths)
                    .fold((0, 0), |(a, s), (fa, fs)| (a.max(fa), s.max(fs)));
                (a, s + 1)
            }
        }
    }
}

impl fmt::Display for SingleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SingleType::Basic(b) => write!(f, "{}", b),
            SingleType::Variant => f.write_str("v"),
            SingleType::Array(e) => write!(f, "a{}", e),
            SingleType::Dict(k, v) => write!(f, "a{{{}{}}}", k, v),
            SingleType::Struct(fields) => write!(f, "({})", fields.iter().join("")),
        }
    }
}

impl FromStr for SingleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SingleType::parse(s)
    }
}

impl From<BasicType> for SingleType {
    fn from(b: BasicType) -> Self {
        SingleType::Basic(b)
    }
}

/// A validated sequence of single complete types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    text: String,
    types: Vec<SingleType>,
}

impl Signature {
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() > MAX_SIGNATURE_LEN {
            return Err(Error::TooLong(s.len()));
        }
        let types = signature_grammar::signature(s).map_err(|e| Error::Parse {
            signature: s.into(),
            offset: e.location.offset,
            expected: e.expected.to_string(),
        })?;
        for t in &types {
            let (arrays, structs) = t.depths();
            if arrays > MAX_ARRAY_DEPTH {
                return Err(Error::ArrayTooDeep(s.into()));
            }
            if structs > MAX_STRUCT_DEPTH {
                return Err(Error::StructTooDeep(s.into()));
            }
        }
        Ok(Signature {
            text: s.into(),
            types,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of single complete types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SingleType> {
        self.types.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SingleType> {
        self.types.iter()
    }

    pub fn types(&self) -> &[SingleType] {
        &self.types
    }

    /// Appends one complete type, keeping the length limit.
    pub fn push(&mut self, t: SingleType) -> Result<()> {
        let rendered = t.to_string();
        let len = self.text.len() + rendered.len();
        if len > MAX_SIGNATURE_LEN {
            return Err(Error::TooLong(len));
        }
        self.text.push_str(&rendered);
        self.types.push(t);
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Signature::parse(s)
    }
}

impl TryFrom<&str> for Signature {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Signature::parse(s)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl Index<usize> for Signature {
    type Output = SingleType;

    fn index(&self, index: usize) -> &SingleType {
        &self.types[index]
    }
}

impl<'a> IntoIterator for &'a Signature {
    type Item = &'a SingleType;
    type IntoIter = std::slice::Iter<'a, SingleType>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.iter()
    }
}

// Signatures travel as their string form.

impl Serialize for BasicType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BasicType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next().and_then(BasicType::from_code), chars.next()) {
            (Some(b), None) => Ok(b),
            _ => Err(de::Error::custom(format!("'{}' is not a basic type code", s))),
        }
    }
}

impl Serialize for SingleType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SingleType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SingleType::parse(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::parse(&s).map_err(de::Error::custom)
    }
}
