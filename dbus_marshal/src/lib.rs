//!Ordered, type-tagged argument encoding for outgoing
//![D-Bus](https://dbus.freedesktop.org/doc/dbus-specification.html) messages.
//!
//!An [`ArgumentCursor`] takes exclusive hold of a message and appends
//!arguments to the end of its body, one at a time and in call order. Every
//!value is checked before it reaches the message: strings must not contain
//!NUL bytes, object paths and signatures must be well formed, and the
//!contents of a container must match the type it was opened with. The
//!cursor ends with [`ArgumentCursor::finish`], which writes the terminator
//!and seals the argument list.
//!
//!The message itself is reached through the [`AppendTarget`] trait, the
//!small iterator surface a message-bus library offers for appending.
//![`Message`] implements it with the D-Bus body wire format and can read
//!its arguments back.
//!
//!```rust
//!use dbus_marshal::{ArgumentCursor, Message, Value};
//!
//!# fn main() -> dbus_marshal::Result<()> {
//!let mut msg = Message::method_call(
//!    Some("org.example.Service"),
//!    "/org/example/Object",
//!    Some("org.example.Iface"),
//!    "Update",
//!)?;
//!
//!let mut cursor = ArgumentCursor::new(&mut msg)?;
//!cursor.append_int32(-5)?;
//!cursor.append_uint32(100)?;
//!cursor.append_dict("s", "v", |d| {
//!    d.append_dict_entry(|e| {
//!        e.append("verbose")?;
//!        e.append_variant("b", |v| v.append(true))
//!    })
//!})?;
//!cursor.finish()?;
//!cursor.release();
//!
//!assert_eq!(msg.signature(), "iua{sv}");
//!assert_eq!(&msg.body()[..8], &[0xfb, 0xff, 0xff, 0xff, 0x64, 0, 0, 0]);
//!
//!let args = msg.read_arguments()?;
//!assert_eq!(args[0], Value::Int32(-5));
//!assert_eq!(args[1], Value::Uint32(100));
//!# Ok(())
//!# }
//!```
//!
//!Errors from a container closure abandon the container, so a failed
//!`append_struct` leaves nothing of the struct behind:
//!
//!```rust
//!use dbus_marshal::{ArgumentCursor, Error, Message};
//!
//!let mut msg = Message::method_call(None, "/", None, "Set").unwrap();
//!let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
//!cursor.append_int32(1).unwrap();
//!let err = cursor
//!    .append_struct(|s| {
//!        s.append("ok")?;
//!        s.append("bad\0string")
//!    })
//!    .unwrap_err();
//!assert!(matches!(err, Error::InvalidValue { .. }));
//!cursor.finish().unwrap();
//!drop(cursor);
//!
//!assert_eq!(msg.signature(), "i");
//!assert_eq!(msg.body().len(), 4);
//!```

pub use dbus_signature::{BasicType, Signature, SingleType};

pub use crate::cursor::{ArgumentCursor, ArgumentWriter, CursorState};
pub use crate::error::{Error, Result};
pub use crate::message::{Message, MessageIter, MessageType};
pub use crate::options::{
    ByteOrder, EncoderOptions, MAX_ARRAY_LEN, MAX_BODY_SIZE, MAX_DEPTH, MAX_TOTAL_DEPTH,
};
pub use crate::target::AppendTarget;
pub use crate::types::{is_valid_object_path, Basic, BasicValue, ContainerKind, ObjectPath, UnixFd, WireType};
pub use crate::value::Value;

mod cursor;
mod error;
mod message;
mod options;
mod target;
mod types;
mod value;

#[cfg(test)]
mod test;
