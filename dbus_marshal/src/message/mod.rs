//! An in-memory outgoing message that speaks the D-Bus body wire format.
//!
//! [`Message`] is a complete [`AppendTarget`]: it aligns every value to its
//! natural boundary relative to the start of the body, tracks the body
//! signature, back-patches array lengths when an array is closed and can
//! decode its own body again with [`Message::read_arguments`].

use dbus_signature::{Signature, SingleType, MAX_SIGNATURE_LEN};
use log::{debug, trace};

use crate::options::{ByteOrder, EncoderOptions};
use crate::target::AppendTarget;
use crate::types::{BasicValue, ContainerKind, ObjectPath, WireType};
use crate::value::Value;
use crate::{Error, Result};

mod reader;

use self::reader::BodyReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    MethodCall,
    Signal,
}

/// Append position inside a [`Message`].
#[derive(Debug)]
pub struct MessageIter {
    /// `None` at the top level of the body.
    kind: Option<ContainerKind>,
    /// Whether type codes written here belong in the body signature.
    /// Array and variant contents are covered by the container's own type.
    records: bool,
    body_mark: usize,
    sig_mark: usize,
    length_at: usize,
    start: usize,
}

impl MessageIter {
    fn top() -> Self {
        MessageIter {
            kind: None,
            records: true,
            body_mark: 0,
            sig_mark: 0,
            length_at: 0,
            start: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    message_type: MessageType,
    destination: Option<String>,
    path: ObjectPath,
    interface: Option<String>,
    member: String,
    signature: String,
    body: Vec<u8>,
    args: usize,
    options: EncoderOptions,
    sealed: bool,
    writer_active: bool,
}

impl Message {
    fn new(
        message_type: MessageType,
        destination: Option<&str>,
        path: &str,
        interface: Option<&str>,
        member: &str,
    ) -> Result<Self> {
        if let Some(destination) = destination {
            if !is_valid_bus_name(destination) {
                return Err(invalid_name("bus name", destination));
            }
        }
        if let Some(interface) = interface {
            if !is_valid_interface_name(interface) {
                return Err(invalid_name("interface name", interface));
            }
        }
        if !is_valid_member_name(member) {
            return Err(invalid_name("member name", member));
        }
        Ok(Message {
            message_type,
            destination: destination.map(String::from),
            path: ObjectPath::new(path)?,
            interface: interface.map(String::from),
            member: member.into(),
            signature: String::new(),
            body: Vec::new(),
            args: 0,
            options: EncoderOptions::default(),
            sealed: false,
            writer_active: false,
        })
    }

    pub fn method_call(
        destination: Option<&str>,
        path: &str,
        interface: Option<&str>,
        member: &str,
    ) -> Result<Self> {
        Self::new(MessageType::MethodCall, destination, path, interface, member)
    }

    /// Signals always carry an interface.
    pub fn signal(path: &str, interface: &str, member: &str) -> Result<Self> {
        Self::new(MessageType::Signal, None, path, Some(interface), member)
    }

    /// Replaces the encoding options; only possible while the body is empty.
    pub fn with_options(mut self, options: EncoderOptions) -> Result<Self> {
        if !self.body.is_empty() || !self.signature.is_empty() {
            return Err(Error::InvalidMessageState(
                "options must be set before arguments are appended".into(),
            ));
        }
        self.options = options;
        Ok(self)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// Body signature written so far.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.options.byte_order
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Number of complete top-level arguments.
    pub fn arg_count(&self) -> usize {
        self.args
    }

    /// Whether the argument list has been terminated.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Decodes the body against its signature.
    pub fn read_arguments(&self) -> Result<Vec<Value>> {
        let signature = Signature::parse(&self.signature)?;
        let mut reader = BodyReader::new(&self.body, self.options.byte_order);
        let values = signature
            .iter()
            .map(|t| reader.read(t))
            .collect::<Result<Vec<_>>>()?;
        if !reader.is_at_end() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after the last argument",
                reader.remaining()
            )));
        }
        Ok(values)
    }

    fn align(&mut self, alignment: usize) {
        let pad = (alignment - self.body.len() % alignment) % alignment;
        self.body.resize(self.body.len() + pad, 0);
    }

    fn put_u16(&mut self, v: u16) {
        let bytes = match self.options.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        };
        self.body.extend_from_slice(&bytes);
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        match self.options.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn put_u32(&mut self, v: u32) {
        let bytes = self.u32_bytes(v);
        self.body.extend_from_slice(&bytes);
    }

    fn put_u64(&mut self, v: u64) {
        let bytes = match self.options.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        };
        self.body.extend_from_slice(&bytes);
    }

    fn put_string(&mut self, s: &str) -> bool {
        let len = match u32::try_from(s.len()) {
            Ok(len) => len,
            Err(_) => return false,
        };
        self.put_u32(len);
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
        true
    }

    fn put_signature(&mut self, s: &str) -> bool {
        let len = match u8::try_from(s.len()) {
            Ok(len) => len,
            Err(_) => return false,
        };
        self.body.push(len);
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
        true
    }

    fn write_basic(&mut self, value: BasicValue<'_>) -> bool {
        self.align(value.basic_type().alignment());
        match value {
            BasicValue::Byte(v) => self.body.push(v),
            BasicValue::Boolean(v) => self.put_u32(u32::from(v)),
            BasicValue::Int16(v) => self.put_u16(v as u16),
            BasicValue::Uint16(v) => self.put_u16(v),
            BasicValue::Int32(v) => self.put_u32(v as u32),
            BasicValue::Uint32(v) | BasicValue::UnixFd(v) => self.put_u32(v),
            BasicValue::Int64(v) => self.put_u64(v as u64),
            BasicValue::Uint64(v) => self.put_u64(v),
            BasicValue::Double(v) => self.put_u64(v.to_bits()),
            BasicValue::String(s) | BasicValue::ObjectPath(s) => return self.put_string(s),
            BasicValue::Signature(s) => return self.put_signature(s),
        }
        true
    }

    fn push_signature(&mut self, codes: &str) -> bool {
        if self.signature.len() + codes.len() > MAX_SIGNATURE_LEN {
            return false;
        }
        self.signature.push_str(codes);
        true
    }

    fn rollback(&mut self, body_mark: usize, sig_mark: usize) {
        self.body.truncate(body_mark);
        self.signature.truncate(sig_mark);
    }
}

impl AppendTarget for Message {
    type Iter = MessageIter;

    fn is_writable(&self) -> bool {
        !self.sealed && !self.writer_active
    }

    fn max_depth(&self) -> usize {
        self.options.max_depth
    }

    fn iter_init_append(&mut self) -> Option<MessageIter> {
        self.writer_active = true;
        Some(MessageIter::top())
    }

    fn iter_append_basic(&mut self, iter: &mut MessageIter, value: BasicValue<'_>) -> bool {
        if self.sealed {
            return false;
        }
        let (body_mark, sig_mark) = (self.body.len(), self.signature.len());
        let code = value.basic_type().code().to_string();
        if iter.records && !self.push_signature(&code) {
            return false;
        }
        if !self.write_basic(value) || self.body.len() > self.options.max_body_size {
            self.rollback(body_mark, sig_mark);
            return false;
        }
        if iter.kind.is_none() {
            self.args += 1;
        }
        true
    }

    fn iter_open_container(
        &mut self,
        iter: &mut MessageIter,
        kind: ContainerKind,
        contained: Option<&str>,
    ) -> Option<MessageIter> {
        if self.sealed {
            return None;
        }
        let mut sub = MessageIter {
            kind: Some(kind),
            records: false,
            body_mark: self.body.len(),
            sig_mark: self.signature.len(),
            length_at: 0,
            start: 0,
        };
        match kind {
            ContainerKind::Array => {
                let array = SingleType::parse(&format!("a{}", contained?)).ok()?;
                let element_alignment = array.element_alignment()?;
                if iter.records && !self.push_signature(&array.to_string()) {
                    return None;
                }
                self.align(4);
                sub.length_at = self.body.len();
                self.put_u32(0);
                // Padding to the first element is there even when the array stays empty.
                self.align(element_alignment);
                sub.start = self.body.len();
            }
            ContainerKind::Struct => {
                if iter.records && !self.push_signature("(") {
                    return None;
                }
                self.align(8);
                sub.records = iter.records;
            }
            ContainerKind::DictEntry => self.align(8),
            ContainerKind::Variant => {
                let inner = SingleType::parse(contained?).ok()?;
                if iter.records && !self.push_signature("v") {
                    return None;
                }
                if !self.put_signature(&inner.to_string()) {
                    self.rollback(sub.body_mark, sub.sig_mark);
                    return None;
                }
            }
        }
        trace!("message: opened {:?} at offset {}", kind, sub.body_mark);
        Some(sub)
    }

    fn iter_close_container(&mut self, iter: &mut MessageIter, sub: MessageIter) -> bool {
        match sub.kind {
            Some(ContainerKind::Array) => {
                let len = self.body.len() - sub.start;
                let len = match u32::try_from(len) {
                    Ok(len) if len as usize <= self.options.max_array_len => len,
                    _ => {
                        self.rollback(sub.body_mark, sub.sig_mark);
                        return false;
                    }
                };
                let bytes = self.u32_bytes(len);
                self.body[sub.length_at..sub.length_at + 4].copy_from_slice(&bytes);
            }
            Some(ContainerKind::Struct) => {
                if sub.records && !self.push_signature(")") {
                    self.rollback(sub.body_mark, sub.sig_mark);
                    return false;
                }
            }
            _ => {}
        }
        if self.body.len() > self.options.max_body_size {
            self.rollback(sub.body_mark, sub.sig_mark);
            return false;
        }
        if iter.kind.is_none() {
            self.args += 1;
        }
        true
    }

    fn iter_abandon_container(&mut self, _iter: &mut MessageIter, sub: MessageIter) {
        self.rollback(sub.body_mark, sub.sig_mark);
    }

    fn iter_release(&mut self, _iter: MessageIter) {
        self.writer_active = false;
    }

    fn append_terminator(&mut self) -> bool {
        if self.sealed {
            return false;
        }
        self.sealed = true;
        debug!(
            "message {} sealed with signature '{}' and {} body bytes",
            self.member,
            self.signature,
            self.body.len()
        );
        true
    }
}

fn invalid_name(what: &str, name: &str) -> Error {
    Error::InvalidValue {
        wire_type: WireType::String,
        reason: format!("'{}' is not a valid {}", name, what),
    }
}

fn is_name_element(element: &str, allow_hyphen: bool, allow_leading_digit: bool) -> bool {
    let mut bytes = element.bytes();
    let first_ok = match bytes.next() {
        Some(b) => {
            b.is_ascii_alphabetic()
                || b == b'_'
                || (allow_hyphen && b == b'-')
                || (allow_leading_digit && b.is_ascii_digit())
        }
        None => false,
    };
    first_ok && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || (allow_hyphen && b == b'-'))
}

fn is_valid_member_name(name: &str) -> bool {
    name.len() <= 255 && is_name_element(name, false, false)
}

fn is_valid_interface_name(name: &str) -> bool {
    name.len() <= 255
        && name.split('.').count() >= 2
        && name.split('.').all(|e| is_name_element(e, false, false))
}

fn is_valid_bus_name(name: &str) -> bool {
    if name.len() > 255 {
        return false;
    }
    match name.strip_prefix(':') {
        Some(unique) => {
            unique.split('.').count() >= 2 && unique.split('.').all(|e| is_name_element(e, true, true))
        }
        None => name.split('.').count() >= 2 && name.split('.').all(|e| is_name_element(e, true, false)),
    }
}
