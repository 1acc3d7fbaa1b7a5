//! Wire-format properties: chunking invariance and round-trips.
//!
//! These run the full read path (`MemoryTransport` → `ByteFramer` →
//! `MessageCollector`) rather than the parser alone, so the framer's read
//! buffering is covered too.

use menulink_protocol::{
    ByteFramer, Message, MessageCollector, MessageType, ParsedField, Tag, fields,
};
use menulink_transport::{MemoryTransport, Transport};
use proptest::prelude::*;

/// Feeds `chunks` one at a time, draining the framer after each.
fn parse_in_chunks(chunks: &[&[u8]]) -> Vec<ParsedField> {
    let (local, peer) = MemoryTransport::pair();
    let mut framer = ByteFramer::new(local);
    let mut out = Vec::new();
    for chunk in chunks {
        peer.clone().write(chunk).unwrap();
        while let Some(field) = framer.next_field() {
            out.push(field);
        }
    }
    out
}

fn collect(fields: Vec<ParsedField>) -> Vec<Message> {
    let mut collector = MessageCollector::new();
    fields.into_iter().filter_map(|f| collector.push(f)).collect()
}

/// One example of every reserved message type, shaped like real traffic.
fn reserved_messages() -> Vec<Message> {
    vec![
        Message::new(MessageType::Join)
            .with_field(fields::NAME, "dashboard")
            .with_field(fields::VERSION, 101)
            .with_field(fields::PLATFORM, 1)
            .with_field(fields::UUID, "07cd8bc6-734d-43da-84e7"),
        Message::new(MessageType::Heartbeat)
            .with_field(fields::HB_INTERVAL, 10000)
            .with_field(fields::HB_MODE, 0),
        Message::new(MessageType::Bootstrap).with_field(fields::BOOT_TYPE, "START"),
        Message::new(MessageType::AnalogBoot)
            .with_field(fields::PARENT, 0)
            .with_field(fields::ID, 1)
            .with_field(fields::EEPROM, 2)
            .with_field(fields::READ_ONLY, 0)
            .with_field(fields::VISIBLE, 1)
            .with_field(fields::NAME, "Volume")
            .with_field(fields::ANALOG_UNIT, "dB")
            .with_field(fields::ANALOG_MAX, 255)
            .with_field(fields::ANALOG_OFFSET, -190)
            .with_field(fields::ANALOG_DIVISOR, 2)
            .with_field(fields::CURRENT_VAL, 0),
        Message::new(MessageType::ActionBoot)
            .with_field(fields::ID, 9)
            .with_field(fields::NAME, "Reset")
            .with_field(fields::CURRENT_VAL, 0),
        Message::new(MessageType::SubMenuBoot)
            .with_field(fields::ID, 3)
            .with_field(fields::NAME, "Settings"),
        Message::new(MessageType::EnumBoot)
            .with_field(fields::ID, 2)
            .with_field(fields::NO_OF_CHOICES, 3)
            .with_field(Tag::new(b"CA"), "CD Player")
            .with_field(Tag::new(b"CB"), "Turntable")
            .with_field(Tag::new(b"CC"), "Computer"),
        Message::new(MessageType::BooleanBoot)
            .with_field(fields::ID, 4)
            .with_field(fields::BOOL_NAMING, 1)
            .with_field(fields::CURRENT_VAL, 1),
        Message::new(MessageType::TextBoot)
            .with_field(fields::ID, 6)
            .with_field(fields::MAX_LEN, 10)
            .with_field(fields::CURRENT_VAL, "a|b\\c"),
        Message::new(MessageType::FloatBoot)
            .with_field(fields::ID, 7)
            .with_field(fields::FLOAT_DP, 2)
            .with_field(fields::CURRENT_VAL, "21.50"),
        Message::new(MessageType::RemoteBoot)
            .with_field(fields::ID, 11)
            .with_field(fields::REMOTE_NO, 0)
            .with_field(fields::CURRENT_VAL, "dash:A:1.1:1"),
        Message::new(MessageType::ValueChange)
            .with_field(fields::ID, 1)
            .with_field(fields::CHANGE_TYPE, 0)
            .with_field(fields::CURRENT_VAL, -5)
            .with_field(fields::CORRELATION, "1fa3"),
        Message::new(MessageType::Pairing)
            .with_field(fields::NAME, "tablet")
            .with_field(fields::UUID, "b2a1"),
        Message::new(MessageType::Acknowledgement)
            .with_field(fields::CORRELATION, "1fa3")
            .with_field(fields::ACK_STATUS, 1),
        Message::new(MessageType::Dialog)
            .with_field(fields::DIALOG_MODE, "A")
            .with_field(fields::BUTTON, 1),
    ]
}

#[test]
fn test_every_reserved_type_round_trips() {
    let messages = reserved_messages();
    for ty in MessageType::ALL {
        assert!(
            messages.iter().any(|m| m.message_type == ty.tag()),
            "no sample for {ty}"
        );
    }

    for msg in messages {
        let bytes = msg.encode();
        let decoded = collect(parse_in_chunks(&[&bytes]));
        assert_eq!(decoded, vec![msg.clone()], "decode of {msg}");
        assert_eq!(decoded[0].encode(), bytes, "re-encode of {msg}");
    }
}

#[test]
fn test_one_byte_at_a_time_matches_whole() {
    let mut stream = Vec::new();
    for msg in reserved_messages() {
        msg.encode_into(&mut stream);
    }
    let whole = parse_in_chunks(&[&stream]);
    let bytes: Vec<&[u8]> = stream.chunks(1).collect();
    assert_eq!(parse_in_chunks(&bytes), whole);
    assert_eq!(collect(whole), reserved_messages());
}

#[test]
fn test_unknown_message_types_still_parse() {
    let custom = Message::new(Tag::new(b"ZX")).with_field(Tag::new(b"QQ"), "custom");
    let decoded = collect(parse_in_chunks(&[&custom.encode()]));
    assert_eq!(decoded, vec![custom]);
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

fn arb_tag() -> impl Strategy<Value = Tag> {
    (b'A'..=b'Z', b'A'..=b'Z').prop_map(|(a, b)| Tag([a, b]))
}

/// Values of up to 24 ASCII bytes, including the ones that need escaping.
fn arb_value() -> impl Strategy<Value = String> {
    proptest::collection::vec(0u8..0x7f, 0..=24)
        .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

fn arb_message() -> impl Strategy<Value = Message> {
    (
        arb_tag(),
        proptest::collection::vec((arb_tag(), arb_value()), 0..8),
    )
        .prop_map(|(message_type, fields)| Message {
            message_type,
            fields,
        })
}

proptest! {
    #[test]
    fn prop_chunking_does_not_change_output(
        messages in proptest::collection::vec(arb_message(), 1..5),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
    ) {
        let mut stream = Vec::new();
        for msg in &messages {
            msg.encode_into(&mut stream);
        }

        let mut points: Vec<usize> = cuts.iter().map(|c| c.index(stream.len() + 1)).collect();
        points.push(0);
        points.push(stream.len());
        points.sort_unstable();
        points.dedup();
        let chunks: Vec<&[u8]> = points.windows(2).map(|w| &stream[w[0]..w[1]]).collect();

        let whole = parse_in_chunks(&[&stream]);
        let split = parse_in_chunks(&chunks);
        prop_assert_eq!(&split, &whole);
        prop_assert_eq!(collect(whole), messages);
    }
}
