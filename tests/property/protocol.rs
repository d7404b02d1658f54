//! Property-based tests for the signaling wire format.
//!
//! Uses proptest to verify:
//! 1. Arbitrary bytes never make `decode_client` panic.
//! 2. Negotiation payloads pass through decode -> re-wrap -> encode with
//!    every opaque field intact and only `from` added.
//! 3. Room codes match whether sent as JSON strings or numbers.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use lantern_proto::codec;
use lantern_proto::signal::{ClientMessage, CodeValue, ServerMessage};

/// Strategy for opaque payload field names that do not collide with the
/// routing fields.
fn arb_field_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9]{0,11}"
        .prop_filter("routing field", |k| !matches!(k.as_str(), "type" | "to" | "from"))
}

/// Strategy for small JSON values as they appear in SDP/ICE payloads.
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[^\x00]{0,64}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_payload() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(arb_field_name(), arb_json_value(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_client(&bytes, 64 * 1024);
    }

    #[test]
    fn random_objects_never_panic(kind in "[a-z-]{0,16}", payload in arb_payload()) {
        let mut obj = payload;
        obj.insert("type".to_string(), Value::String(kind));
        let text = Value::Object(obj).to_string();
        let _ = codec::decode_client(text.as_bytes(), 64 * 1024);
    }

    #[test]
    fn negotiation_payload_forwarded_verbatim(
        kind in prop_oneof![Just("offer"), Just("answer"), Just("ice-candidate")],
        to in proptest::option::of("[a-z0-9-]{1,16}"),
        from in "[a-z0-9-]{1,16}",
        payload in arb_payload(),
    ) {
        let mut wire = payload.clone();
        wire.insert("type".to_string(), json!(kind));
        if let Some(ref to) = to {
            wire.insert("to".to_string(), json!(to));
        }
        wire.insert("from".to_string(), json!("spoofed"));
        let text = Value::Object(wire).to_string();

        let msg = codec::decode_client(text.as_bytes(), 64 * 1024).unwrap();
        let (neg_kind, mut body) = msg.into_negotiation().unwrap();
        prop_assert_eq!(neg_kind.as_str(), kind);
        body.from = Some(from.clone());
        let out = codec::encode_server(&ServerMessage::negotiation(neg_kind, body)).unwrap();
        let out: Value = serde_json::from_str(&out).unwrap();

        let mut expected = payload;
        expected.insert("type".to_string(), json!(kind));
        expected.insert("from".to_string(), json!(from));
        if let Some(to) = to {
            expected.insert("to".to_string(), json!(to));
        }
        prop_assert_eq!(out, Value::Object(expected));
    }

    #[test]
    fn code_matches_as_string_or_number(code in 1000u32..=9999, other in 1000u32..=9999) {
        let access = code.to_string();
        let as_text: ClientMessage = serde_json::from_value(
            json!({"type": "join", "room": "r", "role": "receiver", "code": &access}),
        ).unwrap();
        let as_number: ClientMessage = serde_json::from_value(
            json!({"type": "join", "room": "r", "role": "receiver", "code": code}),
        ).unwrap();

        for msg in [as_text, as_number] {
            let ClientMessage::Join { code: Some(value), .. } = msg else {
                return Err(TestCaseError::fail("expected join with code"));
            };
            prop_assert!(value.matches(&access));
            prop_assert_eq!(value.matches(&other.to_string()), code == other);
        }

        prop_assert!(!CodeValue::Text(access).is_blank());
    }
}
