//! The argument cursor: ordered, type-checked appends into one message.
//!
//! A cursor moves through three states:
//!
//! - `Created`: bound to the message, nothing written yet
//! - `Appending`: at least one argument was written
//! - `Sealed`: the terminator was written, the argument list is closed
//!
//! Containers are written through [`ArgumentWriter`] closures. A container
//! is closed when its closure returns `Ok` and abandoned, with everything
//! written into it, when the closure returns an error.

use std::fmt;

use dbus_signature::{BasicType, SingleType};
use log::{debug, trace, warn};

use crate::options::{EncoderOptions, MAX_TOTAL_DEPTH};
use crate::target::AppendTarget;
use crate::types::{Basic, BasicValue, ContainerKind, WireType};
use crate::value::Value;
use crate::{Error, Result};

/// Cursor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    Created,
    Appending,
    Sealed,
}

/// What the next complete type written at a level has to be.
#[derive(Debug, Clone, PartialEq)]
enum Expect {
    /// Top level and structs of unknown shape.
    Any,
    /// Array elements.
    Repeat(SingleType),
    /// Dictionary contents: dict entries only.
    Entries(BasicType, SingleType),
    /// Known struct fields, variant contents, dict entry key and value.
    Sequence { types: Vec<SingleType>, next: usize },
}

impl Expect {
    fn sequence(types: Vec<SingleType>) -> Self {
        Expect::Sequence { types, next: 0 }
    }

    fn describe(&self) -> String {
        match self {
            Expect::Any => "any type".into(),
            Expect::Repeat(t) => t.to_string(),
            Expect::Entries(k, v) => format!("{{{}{}}}", k, v),
            Expect::Sequence { types, next } => match types.get(*next) {
                Some(t) => t.to_string(),
                None => "end of container".into(),
            },
        }
    }

    fn mismatch(&self, found: impl fmt::Display) -> Error {
        Error::SignatureMismatch {
            expected: self.describe(),
            found: found.to_string(),
        }
    }

    fn check(&self, candidate: &SingleType) -> Result<()> {
        let expected = match self {
            Expect::Any => return Ok(()),
            Expect::Repeat(t) => Some(t),
            Expect::Entries(..) => None,
            Expect::Sequence { types, next } => types.get(*next),
        };
        match expected {
            Some(t) if t == candidate => Ok(()),
            _ => Err(self.mismatch(candidate)),
        }
    }

    /// Expectation for the fields of a struct opened at this level.
    fn struct_fields(&self) -> Result<Expect> {
        let expected = match self {
            Expect::Any => return Ok(Expect::Any),
            Expect::Repeat(t) => Some(t),
            Expect::Entries(..) => None,
            Expect::Sequence { types, next } => types.get(*next),
        };
        match expected {
            Some(SingleType::Struct(fields)) => Ok(Expect::sequence(fields.clone())),
            _ => Err(self.mismatch("(...)")),
        }
    }

    fn dict_entry(&self) -> Result<Expect> {
        match self {
            Expect::Entries(k, v) => Ok(Expect::sequence(vec![
                SingleType::Basic(*k),
                v.clone(),
            ])),
            _ => Err(self.mismatch("{...}")),
        }
    }

    fn advance(&mut self) {
        if let Expect::Sequence { next, .. } = self {
            *next += 1;
        }
    }

    fn complete(&self) -> Result<()> {
        match self {
            Expect::Sequence { types, next } if *next < types.len() => {
                Err(self.mismatch("end of container"))
            }
            _ => Ok(()),
        }
    }
}

/// A container about to be opened.
enum Open {
    Array(SingleType),
    Dict(BasicType, SingleType),
    Struct,
    Variant(SingleType),
    DictEntry,
}

impl Open {
    fn kind(&self) -> ContainerKind {
        match self {
            Open::Array(_) | Open::Dict(..) => ContainerKind::Array,
            Open::Struct => ContainerKind::Struct,
            Open::Variant(_) => ContainerKind::Variant,
            Open::DictEntry => ContainerKind::DictEntry,
        }
    }

    fn contained(&self) -> Option<String> {
        match self {
            Open::Array(e) => Some(e.to_string()),
            Open::Dict(k, v) => Some(format!("{{{}{}}}", k, v)),
            Open::Variant(t) => Some(t.to_string()),
            Open::Struct | Open::DictEntry => None,
        }
    }
}

/// Type and nesting bookkeeping for one container level.
#[derive(Debug)]
struct Level {
    kind: Option<ContainerKind>,
    expect: Expect,
    count: usize,
    array_depth: usize,
    struct_depth: usize,
    total_depth: usize,
}

impl Level {
    fn top() -> Self {
        Level {
            kind: None,
            expect: Expect::Any,
            count: 0,
            array_depth: 0,
            struct_depth: 0,
            total_depth: 0,
        }
    }

    /// Validates `open` against this level and returns the child level.
    fn open(&self, open: &Open, max_depth: usize) -> Result<Level> {
        let (expect, arrays, structs) = match open {
            Open::Array(e) => {
                self.expect.check(&SingleType::Array(Box::new(e.clone())))?;
                (Expect::Repeat(e.clone()), 1, 0)
            }
            Open::Dict(k, v) => {
                self.expect
                    .check(&SingleType::Dict(*k, Box::new(v.clone())))?;
                (Expect::Entries(*k, v.clone()), 1, 0)
            }
            Open::Struct => (self.expect.struct_fields()?, 0, 1),
            Open::Variant(t) => {
                self.expect.check(&SingleType::Variant)?;
                (Expect::sequence(vec![t.clone()]), 0, 0)
            }
            Open::DictEntry => (self.expect.dict_entry()?, 0, 1),
        };
        let child = Level {
            kind: Some(open.kind()),
            expect,
            count: 0,
            array_depth: self.array_depth + arrays,
            struct_depth: self.struct_depth + structs,
            total_depth: self.total_depth + 1,
        };
        if child.array_depth > max_depth {
            return Err(Error::LimitExceeded(format!(
                "arrays nested deeper than {}",
                max_depth
            )));
        }
        if child.struct_depth > max_depth {
            return Err(Error::LimitExceeded(format!(
                "structs nested deeper than {}",
                max_depth
            )));
        }
        if child.total_depth > MAX_TOTAL_DEPTH {
            return Err(Error::LimitExceeded(format!(
                "containers nested deeper than {}",
                MAX_TOTAL_DEPTH
            )));
        }
        Ok(child)
    }

    fn accept(&mut self) {
        self.expect.advance();
        self.count += 1;
    }

    /// Checks the contents of a container before it is closed.
    fn close(&self) -> Result<()> {
        if self.kind == Some(ContainerKind::Struct) && self.count == 0 {
            return Err(Error::SignatureMismatch {
                expected: "at least one struct field".into(),
                found: "()".into(),
            });
        }
        self.expect.complete()
    }
}

/// Appends arguments at one nesting level of a message.
///
/// The top level is owned by an [`ArgumentCursor`]; containers hand a
/// writer for their contents to the closure passed to `append_array`,
/// `append_struct`, `append_variant`, `append_dict` or `append_dict_entry`.
pub struct ArgumentWriter<'m, M: AppendTarget> {
    message: &'m mut M,
    iter: Option<M::Iter>,
    level: Level,
    max_depth: usize,
}

impl<'m, M: AppendTarget> ArgumentWriter<'m, M> {
    /// Number of complete values written at this level.
    pub fn args_written(&self) -> usize {
        self.level.count
    }

    /// Appends one tagged basic value.
    pub fn append_basic(&mut self, value: BasicValue<'_>) -> Result<()> {
        value.validate()?;
        self.level
            .expect
            .check(&SingleType::Basic(value.basic_type()))?;
        let wire_type = value.wire_type();
        let iter = self
            .iter
            .as_mut()
            .ok_or(Error::InvalidState(CursorState::Sealed))?;
        if !self.message.iter_append_basic(iter, value) {
            return Err(Error::Encode { wire_type });
        }
        trace!("appended {} argument", wire_type);
        self.level.accept();
        Ok(())
    }

    /// Appends any value whose Rust type maps onto a basic wire type.
    pub fn append<T: Basic>(&mut self, value: T) -> Result<()> {
        self.append_basic(value.as_basic())
    }

    pub fn append_int32(&mut self, value: i32) -> Result<()> {
        self.append(value)
    }

    pub fn append_uint32(&mut self, value: u32) -> Result<()> {
        self.append(value)
    }

    /// Appends a value tree, recursing into containers.
    pub fn append_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Byte(v) => self.append(*v),
            Value::Boolean(v) => self.append(*v),
            Value::Int16(v) => self.append(*v),
            Value::Uint16(v) => self.append(*v),
            Value::Int32(v) => self.append(*v),
            Value::Uint32(v) => self.append(*v),
            Value::Int64(v) => self.append(*v),
            Value::Uint64(v) => self.append(*v),
            Value::Double(v) => self.append(*v),
            Value::String(v) => self.append_basic(BasicValue::String(v)),
            Value::ObjectPath(v) => self.append_basic(v.as_basic()),
            Value::Signature(v) => self.append_basic(v.as_basic()),
            Value::UnixFd(v) => self.append(*v),
            Value::Array { element, items } => {
                self.write_container(Open::Array(element.clone()), |w| {
                    items.iter().try_for_each(|item| w.append_value(item))
                })
            }
            Value::Struct(fields) => self.write_container(Open::Struct, |w| {
                fields.iter().try_for_each(|field| w.append_value(field))
            }),
            Value::Variant(inner) => {
                self.write_container(Open::Variant(inner.signature()), |w| {
                    w.append_value(inner)
                })
            }
            Value::Dict {
                key,
                value: value_type,
                entries,
            } => self.write_container(Open::Dict(*key, value_type.clone()), |w| {
                entries.iter().try_for_each(|(k, v)| {
                    w.append_dict_entry(|e| {
                        e.append_value(k)?;
                        e.append_value(v)
                    })
                })
            }),
        }
    }

    /// Appends an array of `element` typed values written by `f`.
    pub fn append_array<F>(&mut self, element: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let element = SingleType::parse(element)?;
        self.write_container(Open::Array(element), f)
    }

    pub fn append_struct<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        self.write_container(Open::Struct, f)
    }

    /// Appends a variant holding exactly one value of type `contained`.
    pub fn append_variant<F>(&mut self, contained: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let contained = SingleType::parse(contained)?;
        self.write_container(Open::Variant(contained), f)
    }

    /// Appends an `a{kv}` dictionary; `f` writes entries with
    /// [`ArgumentWriter::append_dict_entry`].
    pub fn append_dict<F>(&mut self, key: &str, value: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let key_type = SingleType::parse(key)?;
        let key_type = key_type.as_basic().ok_or_else(|| Error::SignatureMismatch {
            expected: "basic dictionary key".into(),
            found: key.into(),
        })?;
        let value_type = SingleType::parse(value)?;
        self.write_container(Open::Dict(key_type, value_type), f)
    }

    /// Appends one key/value entry inside a dictionary.
    pub fn append_dict_entry<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        self.write_container(Open::DictEntry, f)
    }

    fn write_container<F>(&mut self, open: Open, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let child = self.level.open(&open, self.max_depth)?;
        let kind = open.kind();
        let contained = open.contained();

        let iter = self
            .iter
            .as_mut()
            .ok_or(Error::InvalidState(CursorState::Sealed))?;
        let sub = self
            .message
            .iter_open_container(iter, kind, contained.as_deref())
            .ok_or(Error::Encode {
                wire_type: kind.wire_type(),
            })?;
        trace!("opened {:?} container", kind);

        let mut writer = ArgumentWriter {
            message: &mut *self.message,
            iter: Some(sub),
            level: child,
            max_depth: self.max_depth,
        };
        let result = f(&mut writer).and_then(|()| writer.level.close());
        let ArgumentWriter { iter: sub, .. } = writer;

        let sub = sub.ok_or(Error::Encode {
            wire_type: kind.wire_type(),
        })?;
        match result {
            Ok(()) => {
                if !self.message.iter_close_container(iter, sub) {
                    return Err(Error::Encode {
                        wire_type: kind.wire_type(),
                    });
                }
                trace!("closed {:?} container", kind);
                self.level.accept();
                Ok(())
            }
            Err(e) => {
                debug!("abandoning {:?} container: {}", kind, e);
                self.message.iter_abandon_container(iter, sub);
                Err(e)
            }
        }
    }
}

impl<M: AppendTarget> fmt::Debug for ArgumentWriter<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArgumentWriter")
            .field("kind", &self.level.kind)
            .field("expect", &self.level.expect.describe())
            .field("count", &self.level.count)
            .finish()
    }
}

/// Exclusive, ordered append access to the argument list of one message.
///
/// The cursor borrows the message mutably for its whole life, so no second
/// writer can exist. The collaborator's iterator is released exactly once:
/// by [`ArgumentCursor::release`] or when the cursor is dropped.
///
/// ```
/// use dbus_marshal::{ArgumentCursor, Message, Value};
///
/// let mut msg = Message::method_call(
///     Some("org.freedesktop.DBus"),
///     "/org/freedesktop/DBus",
///     Some("org.freedesktop.DBus"),
///     "RequestName",
/// )
/// .unwrap();
///
/// let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
/// cursor.append("org.example.Service").unwrap();
/// cursor.append_uint32(4).unwrap();
/// cursor.finish().unwrap();
/// cursor.release();
///
/// assert_eq!(msg.signature(), "su");
/// assert_eq!(
///     msg.read_arguments().unwrap(),
///     vec![Value::from("org.example.Service"), Value::Uint32(4)]
/// );
/// ```
pub struct ArgumentCursor<'m, M: AppendTarget> {
    writer: ArgumentWriter<'m, M>,
    state: CursorState,
}

impl<'m, M: AppendTarget> ArgumentCursor<'m, M> {
    /// Binds a cursor to the end of `message`'s argument list, nesting up
    /// to the message's own depth limit.
    pub fn new(message: &'m mut M) -> Result<Self> {
        let max_depth = message.max_depth();
        Self::bind(message, max_depth)
    }

    /// Like [`ArgumentCursor::new`]; `options.max_depth` can only lower the
    /// message's depth limit.
    pub fn with_options(message: &'m mut M, options: &EncoderOptions) -> Result<Self> {
        let max_depth = options.max_depth.min(message.max_depth());
        Self::bind(message, max_depth)
    }

    fn bind(message: &'m mut M, max_depth: usize) -> Result<Self> {
        if !message.is_writable() {
            return Err(Error::InvalidMessageState(
                "message is sealed, invalid or already being written".into(),
            ));
        }
        let iter = message.iter_init_append().ok_or(Error::Allocation)?;
        debug!("argument cursor created, max depth {}", max_depth);
        Ok(ArgumentCursor {
            writer: ArgumentWriter {
                message,
                iter: Some(iter),
                level: Level::top(),
                max_depth,
            },
            state: CursorState::Created,
        })
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Number of top-level arguments written so far.
    pub fn args_written(&self) -> usize {
        self.writer.args_written()
    }

    fn writable(&mut self) -> Result<&mut ArgumentWriter<'m, M>> {
        if self.state == CursorState::Sealed {
            warn!("append on a finished argument list");
            return Err(Error::InvalidState(self.state));
        }
        Ok(&mut self.writer)
    }

    fn track(&mut self, result: Result<()>) -> Result<()> {
        if result.is_ok() {
            self.state = CursorState::Appending;
        }
        result
    }

    pub fn append_basic(&mut self, value: BasicValue<'_>) -> Result<()> {
        let result = self.writable()?.append_basic(value);
        self.track(result)
    }

    pub fn append<T: Basic>(&mut self, value: T) -> Result<()> {
        let result = self.writable()?.append(value);
        self.track(result)
    }

    pub fn append_int32(&mut self, value: i32) -> Result<()> {
        self.append(value)
    }

    pub fn append_uint32(&mut self, value: u32) -> Result<()> {
        self.append(value)
    }

    pub fn append_value(&mut self, value: &Value) -> Result<()> {
        let result = self.writable()?.append_value(value);
        self.track(result)
    }

    /// Appends every value of `values` in order, stopping at the first failure.
    pub fn append_values<'v, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'v Value>,
    {
        values.into_iter().try_for_each(|v| self.append_value(v))
    }

    pub fn append_array<F>(&mut self, element: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let result = self.writable()?.append_array(element, f);
        self.track(result)
    }

    pub fn append_struct<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let result = self.writable()?.append_struct(f);
        self.track(result)
    }

    pub fn append_variant<F>(&mut self, contained: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let result = self.writable()?.append_variant(contained, f);
        self.track(result)
    }

    pub fn append_dict<F>(&mut self, key: &str, value: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArgumentWriter<'_, M>) -> Result<()>,
    {
        let result = self.writable()?.append_dict(key, value, f);
        self.track(result)
    }

    /// Writes the terminator and seals the argument list.
    ///
    /// A second call fails with [`Error::AlreadyFinished`] without touching
    /// the message.
    pub fn finish(&mut self) -> Result<()> {
        if self.state == CursorState::Sealed {
            warn!("argument list finished twice");
            return Err(Error::AlreadyFinished);
        }
        if !self.writer.message.append_terminator() {
            return Err(Error::Encode {
                wire_type: WireType::Invalid,
            });
        }
        self.state = CursorState::Sealed;
        debug!(
            "argument list finished after {} arguments",
            self.writer.level.count
        );
        Ok(())
    }

    /// Releases the message iterator. Dropping the cursor does the same.
    pub fn release(mut self) {
        self.release_iter();
    }

    fn release_iter(&mut self) {
        if let Some(iter) = self.writer.iter.take() {
            self.writer.message.iter_release(iter);
            debug!("argument cursor released in state {:?}", self.state);
        }
    }
}

impl<M: AppendTarget> Drop for ArgumentCursor<'_, M> {
    fn drop(&mut self) {
        self.release_iter();
    }
}

impl<M: AppendTarget> fmt::Debug for ArgumentCursor<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArgumentCursor")
            .field("state", &self.state)
            .field("args_written", &self.writer.level.count)
            .finish()
    }
}
