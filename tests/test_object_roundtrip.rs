//! Serialized objects parse back to themselves.

use indexmap::IndexMap;
use pdf_probe::parser::parse_object;
use pdf_probe::{Object, ObjectRef};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Object> {
    prop_oneof![
        Just(Object::Null),
        any::<bool>().prop_map(Object::Boolean),
        (-1_000_000_000_000i64..1_000_000_000_000).prop_map(Object::Integer),
        // Two decimal places survive the shortest-form writer exactly
        (-10_000_000i64..10_000_000).prop_map(|n| Object::Real(n as f64 / 100.0)),
        prop::collection::vec(any::<u8>(), 0..40).prop_map(Object::String),
        "[A-Za-z0-9 #/()<>_.-]{0,12}".prop_map(Object::Name),
        (1u32..1_000_000, 0u16..10).prop_map(|(id, gen)| Object::Reference(ObjectRef::new(id, gen))),
    ]
}

fn object() -> impl Strategy<Value = Object> {
    leaf().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Object::Array),
            prop::collection::vec(("[A-Za-z][A-Za-z0-9]{0,8}", inner), 0..8).prop_map(|entries| {
                Object::Dictionary(entries.into_iter().collect::<IndexMap<_, _>>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_written_object_parses_back(obj in object()) {
        let bytes = obj.to_pdf_bytes();
        let parsed = parse_object(&bytes);
        prop_assert!(parsed.is_ok(), "{:?} failed on {:?}", parsed, String::from_utf8_lossy(&bytes));
        prop_assert_eq!(parsed.unwrap(), obj);
    }
}

#[test]
fn test_integral_real_keeps_its_kind() {
    let obj = Object::Real(4.0);
    assert_eq!(obj.to_pdf_bytes(), b"4.0");
    assert_eq!(parse_object(b"4.0").unwrap(), obj);
}

#[test]
fn test_name_with_delimiters_round_trips() {
    let obj = Object::Name("A B/C#(D)".to_string());
    let bytes = obj.to_pdf_bytes();
    assert_eq!(bytes, b"/A#20B#2FC#23#28D#29");
    assert_eq!(parse_object(&bytes).unwrap(), obj);
}
