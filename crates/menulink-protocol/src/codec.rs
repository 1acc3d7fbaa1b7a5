//! The tag-value codec: a byte-at-a-time parser and the matching encoder.
//!
//! ## Why byte-at-a-time?
//!
//! Bytes arrive from serial lines, TCP segments and WebSocket frames in
//! whatever chunks the link happens to produce. [`FieldParser::push`] takes
//! one byte, updates a small state machine and only returns something when a
//! whole unit (message start, field, message end, or error) is complete. The
//! parser therefore produces the same output no matter how the input was
//! split, and never needs to buffer more than one value.

use crate::types::{
    END_OF_MESSAGE, ESCAPE, FIELD_TERMINATOR, FieldValue, ParsedField, START_OF_MESSAGE,
    TAG_VAL_PROTOCOL, Tag,
};
use crate::FramingError;

/// Where the parser is inside the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Skipping bytes until a start byte.
    AwaitingStart,
    /// Start byte seen, protocol byte next.
    Protocol,
    MessageTypeHigh,
    MessageTypeLow(u8),
    /// Either the first byte of a field key or the end-of-message byte.
    KeyHigh,
    KeyLow(u8),
    AwaitingEquals(Tag),
    Value(Tag),
    /// The previous value byte was an escape.
    Escaped(Tag),
}

impl ParseState {
    fn describe(self) -> &'static str {
        match self {
            ParseState::AwaitingStart => "start",
            ParseState::Protocol => "protocol",
            ParseState::MessageTypeHigh | ParseState::MessageTypeLow(_) => "message type",
            ParseState::KeyHigh | ParseState::KeyLow(_) => "field key",
            ParseState::AwaitingEquals(_) => "equals",
            ParseState::Value(_) | ParseState::Escaped(_) => "value",
        }
    }
}

/// Resumable tag-value parser.
///
/// ```rust
/// use menulink_protocol::{FieldParser, ParsedField, Tag};
///
/// let mut parser = FieldParser::new();
/// let bytes = b"\x01\x01HBHI=10000|\x02";
/// let parsed: Vec<ParsedField> = bytes.iter().filter_map(|b| parser.push(*b)).collect();
///
/// assert_eq!(parsed.len(), 3);
/// assert_eq!(parsed[0], ParsedField::NewMessage { message_type: Tag::new(b"HB") });
/// ```
#[derive(Debug, Clone)]
pub struct FieldParser {
    state: ParseState,
    message_type: Option<Tag>,
    value: FieldValue,
    truncated: bool,
}

impl Default for FieldParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingStart,
            message_type: None,
            value: FieldValue::new(),
            truncated: false,
        }
    }

    /// Drops any partial message, e.g. after the connection was lost.
    pub fn reset(&mut self) {
        self.state = ParseState::AwaitingStart;
        self.message_type = None;
        self.value.clear();
        self.truncated = false;
    }

    /// `true` while a message has been started but not ended.
    pub fn in_message(&self) -> bool {
        self.message_type.is_some()
    }

    /// Feeds one byte. Returns a unit when this byte completed one.
    pub fn push(&mut self, byte: u8) -> Option<ParsedField> {
        match self.state {
            ParseState::AwaitingStart => {
                if byte == START_OF_MESSAGE {
                    self.state = ParseState::Protocol;
                }
                None
            }
            ParseState::Protocol => {
                if byte == TAG_VAL_PROTOCOL {
                    self.state = ParseState::MessageTypeHigh;
                    None
                } else {
                    self.error(FramingError::UnsupportedProtocol(byte), byte)
                }
            }
            ParseState::MessageTypeHigh => self.tag_byte(byte, ParseState::MessageTypeLow(byte)),
            ParseState::MessageTypeLow(high) => {
                if is_control(byte) {
                    return self.unexpected(byte);
                }
                let message_type = Tag([high, byte]);
                self.message_type = Some(message_type);
                self.state = ParseState::KeyHigh;
                tracing::trace!(msg_type = %message_type, "message started");
                Some(ParsedField::NewMessage { message_type })
            }
            ParseState::KeyHigh => {
                if byte == END_OF_MESSAGE {
                    let message_type = self.message_type.take()?;
                    self.state = ParseState::AwaitingStart;
                    return Some(ParsedField::EndMessage { message_type });
                }
                self.tag_byte(byte, ParseState::KeyLow(byte))
            }
            ParseState::KeyLow(high) => {
                self.tag_byte(byte, ParseState::AwaitingEquals(Tag([high, byte])))
            }
            ParseState::AwaitingEquals(field) => {
                if byte == b'=' {
                    self.value.clear();
                    self.truncated = false;
                    self.state = ParseState::Value(field);
                    None
                } else {
                    self.error(FramingError::MissingEquals { field }, byte)
                }
            }
            ParseState::Value(field) => match byte {
                FIELD_TERMINATOR => {
                    self.state = ParseState::KeyHigh;
                    self.finish_field(field)
                }
                ESCAPE => {
                    self.state = ParseState::Escaped(field);
                    None
                }
                b if is_control(b) => self.unexpected(b),
                b => {
                    self.store(b);
                    None
                }
            },
            ParseState::Escaped(field) => {
                self.store(byte);
                self.state = ParseState::Value(field);
                None
            }
        }
    }

    fn store(&mut self, byte: u8) {
        if !self.value.push(byte) && !self.truncated {
            self.truncated = true;
            tracing::debug!(
                len = self.value.len(),
                "field value too long, truncating"
            );
        }
    }

    fn finish_field(&mut self, field: Tag) -> Option<ParsedField> {
        let message_type = self.message_type?;
        let value = std::mem::take(&mut self.value);
        tracing::trace!(msg_type = %message_type, %field, %value, "field parsed");
        Some(ParsedField::Field {
            message_type,
            field,
            value,
        })
    }

    /// Accepts a printable tag byte and moves to `next`.
    fn tag_byte(&mut self, byte: u8, next: ParseState) -> Option<ParsedField> {
        if is_control(byte) {
            return self.unexpected(byte);
        }
        self.state = next;
        None
    }

    fn unexpected(&mut self, byte: u8) -> Option<ParsedField> {
        let state = self.state.describe();
        self.error(FramingError::UnexpectedByte { state, byte }, byte)
    }

    /// Abandons the current message. If the offending byte is itself a
    /// start byte, parsing resumes right after it.
    fn error(&mut self, error: FramingError, byte: u8) -> Option<ParsedField> {
        tracing::warn!(%error, "framing error, resynchronising");
        self.reset();
        if byte == START_OF_MESSAGE {
            self.state = ParseState::Protocol;
        }
        Some(ParsedField::ProtocolError(error))
    }
}

fn is_control(byte: u8) -> bool {
    byte < 0x20
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Appends the message header for `message_type`.
pub fn encode_start(out: &mut Vec<u8>, message_type: Tag) {
    out.extend_from_slice(&[START_OF_MESSAGE, TAG_VAL_PROTOCOL]);
    out.extend_from_slice(&message_type.bytes());
}

/// Appends `tag=value|`, escaping the value.
pub fn encode_field(out: &mut Vec<u8>, field: Tag, value: &[u8]) {
    out.extend_from_slice(&field.bytes());
    out.push(b'=');
    for &b in value {
        if b == FIELD_TERMINATOR || b == ESCAPE || is_control(b) {
            out.push(ESCAPE);
        }
        out.push(b);
    }
    out.push(FIELD_TERMINATOR);
}

pub fn encode_end(out: &mut Vec<u8>) {
    out.push(END_OF_MESSAGE);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(bytes: &[u8]) -> Vec<ParsedField> {
        let mut parser = FieldParser::new();
        bytes.iter().filter_map(|b| parser.push(*b)).collect()
    }

    fn field(message_type: &[u8; 2], field: &[u8; 2], value: &str) -> ParsedField {
        ParsedField::Field {
            message_type: Tag::new(message_type),
            field: Tag::new(field),
            value: FieldValue::from(value),
        }
    }

    #[test]
    fn test_parses_example_message() {
        let mut bytes = vec![0x01, 0x01, b'B', b'A'];
        bytes.extend_from_slice(b"PI=0|ID=1|NM=Volume|AU=dB|AO=-190|");
        bytes.push(0x02);

        let parsed = parse_all(&bytes);
        assert_eq!(
            parsed,
            vec![
                ParsedField::NewMessage {
                    message_type: Tag::new(b"BA")
                },
                field(b"BA", b"PI", "0"),
                field(b"BA", b"ID", "1"),
                field(b"BA", b"NM", "Volume"),
                field(b"BA", b"AU", "dB"),
                field(b"BA", b"AO", "-190"),
                ParsedField::EndMessage {
                    message_type: Tag::new(b"BA")
                },
            ]
        );
    }

    #[test]
    fn test_escaped_bytes_round_trip() {
        let mut bytes = Vec::new();
        encode_start(&mut bytes, Tag::new(b"VC"));
        encode_field(&mut bytes, Tag::new(b"VC"), b"a|b\\c\nd");
        encode_end(&mut bytes);
        assert!(bytes.windows(2).any(|w| w == b"\\|"));

        let parsed = parse_all(&bytes);
        assert_eq!(parsed[1], field(b"VC", b"VC", "a|b\\c\nd"));
    }

    #[test]
    fn test_garbage_before_start_is_skipped() {
        let mut bytes = b"noise~\n".to_vec();
        encode_start(&mut bytes, Tag::new(b"HB"));
        encode_end(&mut bytes);
        let parsed = parse_all(&bytes);
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[1], ParsedField::EndMessage { .. }));
    }

    #[test]
    fn test_wrong_protocol_byte_is_error_then_resync() {
        let mut bytes = vec![0x01, 0x07, b'N', b'J', 0x02];
        encode_start(&mut bytes, Tag::new(b"HB"));
        encode_end(&mut bytes);

        let parsed = parse_all(&bytes);
        assert_eq!(
            parsed[0],
            ParsedField::ProtocolError(FramingError::UnsupportedProtocol(0x07))
        );
        assert_eq!(
            &parsed[1..],
            &[
                ParsedField::NewMessage {
                    message_type: Tag::new(b"HB")
                },
                ParsedField::EndMessage {
                    message_type: Tag::new(b"HB")
                },
            ]
        );
    }

    #[test]
    fn test_missing_equals_is_error() {
        let bytes = b"\x01\x01HBHI:5|\x02";
        let parsed = parse_all(bytes);
        assert_eq!(
            parsed[1],
            ParsedField::ProtocolError(FramingError::MissingEquals {
                field: Tag::new(b"HI")
            })
        );
        // Nothing after the error belongs to a message any more.
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_start_byte_inside_value_restarts_message() {
        let mut bytes = b"\x01\x01VCID=1".to_vec();
        encode_start(&mut bytes, Tag::new(b"HB"));
        encode_field(&mut bytes, Tag::new(b"HI"), b"100");
        encode_end(&mut bytes);

        let parsed = parse_all(&bytes);
        assert!(matches!(
            parsed[1],
            ParsedField::ProtocolError(FramingError::UnexpectedByte { byte: 0x01, .. })
        ));
        assert_eq!(parsed[2], ParsedField::NewMessage { message_type: Tag::new(b"HB") });
        assert_eq!(parsed[3], field(b"HB", b"HI", "100"));
    }

    #[test]
    fn test_over_length_value_is_truncated_and_rest_dropped() {
        let mut bytes = Vec::new();
        encode_start(&mut bytes, Tag::new(b"NJ"));
        encode_field(&mut bytes, Tag::new(b"NM"), b"abcdefghijklmnopqrstuvwxyz0123456789");
        encode_field(&mut bytes, Tag::new(b"VE"), b"101");
        encode_end(&mut bytes);

        let parsed = parse_all(&bytes);
        assert_eq!(parsed[1], field(b"NJ", b"NM", "abcdefghijklmnopqrstuvwx"));
        assert_eq!(parsed[2], field(b"NJ", b"VE", "101"));
        assert!(matches!(parsed[3], ParsedField::EndMessage { .. }));
    }

    #[test]
    fn test_empty_value_and_empty_message() {
        let mut bytes = Vec::new();
        encode_start(&mut bytes, Tag::new(b"ZZ"));
        encode_field(&mut bytes, Tag::new(b"NM"), b"");
        encode_end(&mut bytes);
        let parsed = parse_all(&bytes);
        assert_eq!(parsed[1], field(b"ZZ", b"NM", ""));
    }

    #[test]
    fn test_reset_discards_partial_message() {
        let mut parser = FieldParser::new();
        for b in b"\x01\x01VCID=12" {
            parser.push(*b);
        }
        assert!(parser.in_message());
        parser.reset();
        assert!(!parser.in_message());
        // Continuing the old message yields nothing.
        assert!(b"3|\x02".iter().all(|b| parser.push(*b).is_none()));
    }
}
