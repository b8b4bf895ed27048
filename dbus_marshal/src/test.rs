use static_assertions::{assert_impl_all, assert_not_impl_any};

use crate::*;

assert_impl_all!(Error: Send, Sync, std::error::Error);
assert_impl_all!(Message: Send, Sync, Clone);
assert_impl_all!(Value: Send, Sync, Clone);
assert_not_impl_any!(ArgumentCursor<'static, Message>: Clone);

fn message() -> Message {
    Message::method_call(
        Some("org.example.Service"),
        "/org/example/Object",
        Some("org.example.Iface"),
        "Call",
    )
    .unwrap()
}

fn encode<F>(f: F) -> Message
where
    F: FnOnce(&mut ArgumentCursor<'_, Message>) -> Result<()>,
{
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    f(&mut cursor).unwrap();
    cursor.finish().unwrap();
    cursor.release();
    msg
}

#[test]
fn test_int32_uint32() {
    let msg = encode(|c| {
        c.append_int32(-5)?;
        c.append_uint32(100)
    });
    assert_eq!(msg.signature(), "iu");
    assert_eq!(msg.body(), &[0xfb, 0xff, 0xff, 0xff, 0x64, 0x00, 0x00, 0x00]);
    assert_eq!(msg.arg_count(), 2);
    assert!(msg.is_sealed());
    assert_eq!(
        msg.read_arguments().unwrap(),
        vec![Value::Int32(-5), Value::Uint32(100)]
    );
}

#[test]
fn test_state_transitions() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    assert_eq!(cursor.state(), CursorState::Created);

    assert!(cursor.append("bad\0").is_err());
    assert_eq!(cursor.state(), CursorState::Created);

    cursor.append_int32(1).unwrap();
    assert_eq!(cursor.state(), CursorState::Appending);
    assert_eq!(cursor.args_written(), 1);

    cursor.finish().unwrap();
    assert_eq!(cursor.state(), CursorState::Sealed);
}

#[test]
fn test_append_after_finish() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.finish().unwrap();

    match cursor.append_int32(1) {
        Err(Error::InvalidState(CursorState::Sealed)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        cursor.append_struct(|s| s.append_int32(1)),
        Err(Error::InvalidState(_))
    ));
    cursor.release();

    assert!(msg.is_sealed());
    assert_eq!(msg.signature(), "");
    assert!(msg.body().is_empty());
    assert_eq!(msg.read_arguments().unwrap(), vec![]);
}

#[test]
fn test_finish_twice() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_int32(3).unwrap();
    cursor.finish().unwrap();
    assert!(matches!(cursor.finish(), Err(Error::AlreadyFinished)));
    assert_eq!(cursor.state(), CursorState::Sealed);
    drop(cursor);
    assert_eq!(msg.body(), &[3, 0, 0, 0]);
}

#[test]
fn test_sealed_message() {
    let mut msg = encode(|c| c.append_int32(1));
    match ArgumentCursor::new(&mut msg) {
        Err(Error::InvalidMessageState(_)) => {}
        other => panic!("unexpected {:?}", other),
    };
}

#[test]
fn test_second_cursor_continues() {
    let mut msg = message();
    {
        let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
        cursor.append_int32(7).unwrap();
    }
    assert!(!msg.is_sealed());

    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_uint32(42).unwrap();
    cursor.finish().unwrap();
    drop(cursor);

    assert_eq!(msg.signature(), "iu");
    assert_eq!(msg.arg_count(), 2);
}

#[test]
fn test_round_trip_order() {
    let values = vec![
        Value::Int32(7),
        Value::Int32(42),
        Value::from("between"),
        Value::Byte(9),
        Value::Double(2.5),
        Value::Boolean(true),
        Value::Int16(-2),
        Value::Uint64(u64::MAX),
    ];
    let msg = encode(|c| c.append_values(&values));
    assert_eq!(msg.signature(), "iisydbnt");
    assert_eq!(msg.read_arguments().unwrap(), values);
}

#[test]
fn test_basic_padding() {
    let msg = encode(|c| {
        c.append(1u8)?;
        c.append_int32(5)
    });
    assert_eq!(msg.signature(), "yi");
    assert_eq!(msg.body(), &[1, 0, 0, 0, 5, 0, 0, 0]);

    let msg = encode(|c| {
        c.append(1u8)?;
        c.append(2i64)
    });
    assert_eq!(msg.body().len(), 16);
    assert_eq!(&msg.body()[8..], &[2, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_string() {
    let msg = encode(|c| c.append("hi"));
    assert_eq!(msg.signature(), "s");
    assert_eq!(msg.body(), &[2, 0, 0, 0, b'h', b'i', 0]);
}

#[test]
fn test_signature_and_path() {
    let msg = encode(|c| {
        c.append(Signature::parse("a{sv}").unwrap())?;
        c.append(ObjectPath::new("/a").unwrap())
    });
    assert_eq!(msg.signature(), "go");
    assert_eq!(
        msg.body(),
        &[5, b'a', b'{', b's', b'v', b'}', 0, 0, 2, 0, 0, 0, b'/', b'a', 0]
    );
}

#[test]
fn test_invalid_values() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();

    match cursor.append_basic(BasicValue::ObjectPath("/trailing/")) {
        Err(Error::InvalidValue { wire_type, .. }) => assert_eq!(wire_type, WireType::ObjectPath),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        cursor.append_basic(BasicValue::Signature("a{")),
        Err(Error::Signature(_))
    ));
    match cursor.append("nul\0inside") {
        Err(e @ Error::InvalidValue { .. }) => assert!(!e.is_fatal_for_message()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(cursor.args_written(), 0);
    drop(cursor);
    assert!(msg.body().is_empty());
}

#[test]
fn test_int64_array() {
    let msg = encode(|c| c.append_array("x", |a| a.append(1i64)));
    assert_eq!(msg.signature(), "ax");
    assert_eq!(
        msg.body(),
        &[8, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_empty_int64_array() {
    let msg = encode(|c| c.append_array("x", |_| Ok(())));
    assert_eq!(msg.signature(), "ax");
    assert_eq!(msg.body(), &[0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        msg.read_arguments().unwrap(),
        vec![Value::array(SingleType::parse("x").unwrap(), Vec::<i64>::new())]
    );
}

#[test]
fn test_variant() {
    let msg = encode(|c| c.append_variant("i", |v| v.append_int32(7)));
    assert_eq!(msg.signature(), "v");
    assert_eq!(msg.body(), &[1, b'i', 0, 0, 7, 0, 0, 0]);
    assert_eq!(msg.read_arguments().unwrap(), vec![Value::variant(7i32)]);
}

#[test]
fn test_variant_contents() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();

    assert!(matches!(
        cursor.append_variant("i", |v| v.append_uint32(1)),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_variant("i", |_| Ok(())),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_variant("i", |v| {
            v.append_int32(1)?;
            v.append_int32(2)
        }),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_variant("ii", |_| Ok(())),
        Err(Error::Signature(_))
    ));
    assert_eq!(cursor.state(), CursorState::Created);
    drop(cursor);
    assert_eq!(msg.signature(), "");
    assert!(msg.body().is_empty());
}

#[test]
fn test_struct() {
    let msg = encode(|c| {
        c.append_struct(|s| {
            s.append(2u8)?;
            s.append_uint32(3)
        })
    });
    assert_eq!(msg.signature(), "(yu)");
    assert_eq!(msg.body(), &[2, 0, 0, 0, 3, 0, 0, 0]);

    let msg = encode(|c| {
        c.append(1u8)?;
        c.append_struct(|s| s.append(2u8))
    });
    assert_eq!(msg.signature(), "y(y)");
    assert_eq!(msg.body(), &[1, 0, 0, 0, 0, 0, 0, 0, 2]);
}

#[test]
fn test_empty_struct() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    assert!(matches!(
        cursor.append_struct(|_| Ok(())),
        Err(Error::SignatureMismatch { .. })
    ));
    drop(cursor);
    assert_eq!(msg.signature(), "");
}

#[test]
fn test_array_type_mismatch() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_int32(1).unwrap();

    match cursor.append_array("i", |a| {
        a.append_int32(2)?;
        a.append("three")
    }) {
        Err(Error::SignatureMismatch { expected, found }) => {
            assert_eq!(expected, "i");
            assert_eq!(found, "s");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        cursor.append_array("(ii)", |a| a.append_struct(|s| s.append_int32(1))),
        Err(Error::SignatureMismatch { .. })
    ));
    cursor.finish().unwrap();
    drop(cursor);

    assert_eq!(msg.signature(), "i");
    assert_eq!(msg.body(), &[1, 0, 0, 0]);
}

#[test]
fn test_abandon_nested() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    let result = cursor.append_array("(si)", |a| {
        a.append_struct(|s| {
            s.append("first")?;
            s.append_int32(1)
        })?;
        a.append_struct(|s| {
            s.append("second")?;
            s.append_basic(BasicValue::ObjectPath("relative"))
        })
    });
    assert!(matches!(result, Err(Error::InvalidValue { .. })));
    assert_eq!(cursor.args_written(), 0);
    drop(cursor);

    assert_eq!(msg.signature(), "");
    assert!(msg.body().is_empty());
}

#[test]
fn test_dict() {
    let msg = encode(|c| {
        c.append_dict("s", "v", |d| {
            d.append_dict_entry(|e| {
                e.append("a")?;
                e.append_variant("i", |v| v.append_int32(1))
            })
        })
    });
    assert_eq!(msg.signature(), "a{sv}");
    assert_eq!(
        msg.body(),
        &[
            16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, b'a', 0, 1, b'i', 0, 0, 0, 0, 1, 0, 0, 0
        ]
    );
    match &msg.read_arguments().unwrap()[0] {
        Value::Dict { key, entries, .. } => {
            assert_eq!(*key, BasicType::String);
            assert_eq!(entries, &vec![(Value::from("a"), Value::variant(1i32))]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_dict_errors() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();

    assert!(matches!(
        cursor.append_dict("(i)", "s", |_| Ok(())),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_dict("s", "s", |d| d.append("loose")),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_dict("s", "s", |d| d.append_dict_entry(|e| e.append("key only"))),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_struct(|s| s.append_dict_entry(|e| e.append_int32(1))),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        cursor.append_dict("s", "u", |d| d.append_dict_entry(|e| {
            e.append_uint32(1)?;
            e.append_uint32(2)
        })),
        Err(Error::SignatureMismatch { .. })
    ));
    drop(cursor);
    assert_eq!(msg.signature(), "");
    assert!(msg.body().is_empty());
}

#[test]
fn test_value_tree() {
    let value = Value::Struct(vec![
        Value::from("name"),
        Value::array(SingleType::parse("s").unwrap(), vec!["x", "y"]),
        Value::variant(Value::Struct(vec![Value::Byte(1), Value::Int64(-1)])),
        Value::Dict {
            key: BasicType::Uint32,
            value: SingleType::parse("ad").unwrap(),
            entries: vec![(
                Value::Uint32(1),
                Value::array(SingleType::parse("d").unwrap(), vec![0.5, 1.5]),
            )],
        },
    ]);
    let msg = encode(|c| c.append_value(&value));
    assert_eq!(msg.signature(), "(sasva{uad})");
    assert_eq!(msg.read_arguments().unwrap(), vec![value]);
}

#[test]
fn test_big_endian() {
    let mut msg = message()
        .with_options(EncoderOptions::default().with_byte_order(ByteOrder::Big))
        .unwrap();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_int32(-5).unwrap();
    cursor.append_uint32(100).unwrap();
    cursor.append_array("q", |a| a.append(0x0102u16)).unwrap();
    cursor.finish().unwrap();
    drop(cursor);

    assert_eq!(msg.byte_order(), ByteOrder::Big);
    assert_eq!(
        msg.body(),
        &[0xff, 0xff, 0xff, 0xfb, 0, 0, 0, 0x64, 0, 0, 0, 2, 1, 2]
    );
    assert_eq!(msg.read_arguments().unwrap()[1], Value::Uint32(100));
}

#[test]
fn test_options_after_append() {
    let msg = encode(|c| c.append_int32(1));
    assert!(matches!(
        msg.with_options(EncoderOptions::default()),
        Err(Error::InvalidMessageState(_))
    ));
}

#[test]
fn test_depth_limit() {
    let mut msg = message();
    let options = EncoderOptions::default().with_max_depth(2);
    let mut cursor = ArgumentCursor::with_options(&mut msg, &options).unwrap();

    cursor
        .append_array("ai", |a| a.append_array("i", |b| b.append_int32(1)))
        .unwrap();
    match cursor.append_array("aai", |a| {
        a.append_array("ai", |b| b.append_array("i", |_| Ok(())))
    }) {
        Err(Error::LimitExceeded(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        cursor.append_struct(|a| a.append_struct(|b| b.append_struct(|c| c.append(1u8)))),
        Err(Error::LimitExceeded(_))
    ));
    drop(cursor);
    assert_eq!(msg.signature(), "aai");
}

fn nested_variants(depth: usize) -> Value {
    (0..depth).fold(Value::Int32(1), |inner, _| Value::variant(inner))
}

#[test]
fn test_total_depth_limit() {
    let mut msg = message();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_int32(1).unwrap();
    match cursor.append_value(&nested_variants(MAX_TOTAL_DEPTH + 1)) {
        Err(Error::LimitExceeded(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(cursor.args_written(), 1);
    drop(cursor);
    assert_eq!(msg.signature(), "i");
    assert_eq!(msg.body(), &[1, 0, 0, 0]);

    let deepest = nested_variants(MAX_TOTAL_DEPTH);
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_value(&deepest).unwrap();
    cursor.finish().unwrap();
    drop(cursor);

    assert_eq!(msg.signature(), "iv");
    assert_eq!(
        msg.read_arguments().unwrap(),
        vec![Value::Int32(1), deepest]
    );
}

#[test]
fn test_message_depth_limit() {
    let mut msg = message()
        .with_options(EncoderOptions::default().with_max_depth(1))
        .unwrap();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_array("i", |a| a.append_int32(1)).unwrap();
    assert!(matches!(
        cursor.append_array("ai", |a| a.append_array("i", |_| Ok(()))),
        Err(Error::LimitExceeded(_))
    ));
    drop(cursor);

    let mut cursor = ArgumentCursor::with_options(&mut msg, &EncoderOptions::default()).unwrap();
    assert!(matches!(
        cursor.append_struct(|s| s.append_struct(|t| t.append(1u8))),
        Err(Error::LimitExceeded(_))
    ));
    cursor.finish().unwrap();
    drop(cursor);

    assert_eq!(msg.signature(), "ai");
}

#[test]
fn test_value_basics() {
    let values = vec![
        Value::Uint16(7),
        Value::Int64(-9),
        Value::ObjectPath(ObjectPath::new("/org/example").unwrap()),
        Value::Signature(Signature::parse("a{sv}").unwrap()),
        Value::UnixFd(UnixFd(3)),
    ];
    let msg = encode(|c| c.append_values(&values));
    assert_eq!(msg.signature(), "qxogh");
    assert_eq!(msg.read_arguments().unwrap(), values);
}

#[test]
fn test_body_size_limit() {
    let mut msg = message()
        .with_options(EncoderOptions::default().with_max_body_size(8))
        .unwrap();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append(1i64).unwrap();
    match cursor.append_int32(2) {
        Err(e @ Error::Encode { .. }) => {
            assert!(e.is_fatal_for_message());
            assert!(matches!(
                e,
                Error::Encode {
                    wire_type: WireType::Int32
                }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
    drop(cursor);
    assert_eq!(msg.signature(), "x");
    assert_eq!(msg.body().len(), 8);
}

#[test]
fn test_array_length_limit() {
    let mut msg = message()
        .with_options(EncoderOptions::default().with_max_array_len(4))
        .unwrap();
    let mut cursor = ArgumentCursor::new(&mut msg).unwrap();
    cursor.append_array("u", |a| a.append_uint32(1)).unwrap();
    assert!(matches!(
        cursor.append_array("u", |a| {
            a.append_uint32(1)?;
            a.append_uint32(2)
        }),
        Err(Error::Encode {
            wire_type: WireType::Array
        })
    ));
    drop(cursor);
    assert_eq!(msg.signature(), "au");
    assert_eq!(msg.body().len(), 8);
}
