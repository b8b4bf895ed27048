use std::str;

use dbus_signature::{BasicType, Signature, SingleType};

use crate::options::{ByteOrder, MAX_ARRAY_LEN, MAX_TOTAL_DEPTH};
use crate::types::{ObjectPath, UnixFd};
use crate::value::Value;
use crate::{Error, Result};

/// Decodes a message body against a signature.
pub(crate) struct BodyReader<'a> {
    body: &'a [u8],
    pos: usize,
    byte_order: ByteOrder,
}

impl<'a> BodyReader<'a> {
    pub(crate) fn new(body: &'a [u8], byte_order: ByteOrder) -> Self {
        BodyReader {
            body,
            pos: 0,
            byte_order,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos == self.body.len()
    }

    pub(crate) fn read(&mut self, t: &SingleType) -> Result<Value> {
        self.read_type(t, 0)
    }

    fn read_type(&mut self, t: &SingleType, depth: usize) -> Result<Value> {
        if depth > MAX_TOTAL_DEPTH {
            return Err(Error::Decode(format!(
                "containers nested deeper than {}",
                MAX_TOTAL_DEPTH
            )));
        }
        match t {
            SingleType::Basic(b) => self.read_basic(*b),
            SingleType::Variant => {
                let inner = Signature::parse(self.signature_str()?)?;
                let inner = match inner.types() {
                    [single] => single.clone(),
                    _ => {
                        return Err(Error::Decode(format!(
                            "variant signature '{}' is not a single complete type",
                            inner
                        )))
                    }
                };
                let value = self.read_type(&inner, depth + 1)?;
                Ok(Value::Variant(Box::new(value)))
            }
            SingleType::Struct(fields) => {
                self.align(8)?;
                let values = fields
                    .iter()
                    .map(|f| self.read_type(f, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Struct(values))
            }
            SingleType::Array(element) => {
                let end = self.array_bounds(element.alignment())?;
                let mut items = Vec::new();
                while self.pos < end {
                    items.push(self.read_type(element, depth + 1)?);
                }
                self.check_end(end)?;
                Ok(Value::Array {
                    element: (**element).clone(),
                    items,
                })
            }
            SingleType::Dict(key, value) => {
                let end = self.array_bounds(8)?;
                let mut entries = Vec::new();
                while self.pos < end {
                    self.align(8)?;
                    let k = self.read_basic(*key)?;
                    let v = self.read_type(value, depth + 1)?;
                    entries.push((k, v));
                }
                self.check_end(end)?;
                Ok(Value::Dict {
                    key: *key,
                    value: (**value).clone(),
                    entries,
                })
            }
        }
    }

    fn read_basic(&mut self, b: BasicType) -> Result<Value> {
        self.align(b.alignment())?;
        let value = match b {
            BasicType::Byte => Value::Byte(self.take(1)?[0]),
            BasicType::Boolean => match self.u32()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                v => {
                    return Err(Error::Decode(format!(
                        "boolean at offset {} holds {}",
                        self.pos - 4,
                        v
                    )))
                }
            },
            BasicType::Int16 => Value::Int16(self.u16()? as i16),
            BasicType::Uint16 => Value::Uint16(self.u16()?),
            BasicType::Int32 => Value::Int32(self.u32()? as i32),
            BasicType::Uint32 => Value::Uint32(self.u32()?),
            BasicType::Int64 => Value::Int64(self.u64()? as i64),
            BasicType::Uint64 => Value::Uint64(self.u64()?),
            BasicType::Double => Value::Double(f64::from_bits(self.u64()?)),
            BasicType::UnixFd => Value::UnixFd(UnixFd(self.u32()?)),
            BasicType::String => Value::String(self.string()?.into()),
            BasicType::ObjectPath => Value::ObjectPath(ObjectPath::new(self.string()?)?),
            BasicType::Signature => Value::Signature(Signature::parse(self.signature_str()?)?),
        };
        Ok(value)
    }

    /// Reads an array length and returns the offset its elements end at.
    fn array_bounds(&mut self, element_alignment: usize) -> Result<usize> {
        self.align(4)?;
        let len = self.u32()? as usize;
        if len > MAX_ARRAY_LEN {
            return Err(Error::Decode(format!("array of {} bytes is too long", len)));
        }
        self.align(element_alignment)?;
        let end = self.pos + len;
        if end > self.body.len() {
            return Err(Error::Decode(format!(
                "array of {} bytes at offset {} runs past the body",
                len, self.pos
            )));
        }
        Ok(end)
    }

    fn check_end(&self, end: usize) -> Result<()> {
        if self.pos == end {
            Ok(())
        } else {
            Err(Error::Decode(format!(
                "array elements end at {} instead of {}",
                self.pos, end
            )))
        }
    }

    fn align(&mut self, alignment: usize) -> Result<()> {
        let pad = (alignment - self.pos % alignment) % alignment;
        let padding = self.take(pad)?;
        if padding.iter().any(|b| *b != 0) {
            return Err(Error::Decode(format!(
                "non-zero padding before offset {}",
                self.pos
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Decode(format!(
                "{} bytes needed at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.body[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.fixed()?;
        Ok(match self.byte_order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.fixed()?;
        Ok(match self.byte_order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    fn u64(&mut self) -> Result<u64> {
        let bytes = self.fixed()?;
        Ok(match self.byte_order {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        })
    }

    fn string(&mut self) -> Result<&'a str> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        self.text(bytes)
    }

    fn signature_str(&mut self) -> Result<&'a str> {
        let len = usize::from(self.take(1)?[0]);
        let bytes = self.take(len)?;
        self.text(bytes)
    }

    fn text(&mut self, bytes: &'a [u8]) -> Result<&'a str> {
        if self.take(1)?[0] != 0 {
            return Err(Error::Decode(format!(
                "missing NUL terminator at offset {}",
                self.pos - 1
            )));
        }
        if bytes.contains(&0) {
            return Err(Error::Decode("string contains a NUL byte".into()));
        }
        str::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))
    }
}
