//! Whole messages as values.
//!
//! The connection state machine consumes [`ParsedField`]s one at a time and
//! never materialises a message. Clients, tools and tests usually want the
//! opposite: a [`Message`] they can build, encode, compare and inspect.
//! [`MessageCollector`] turns the parser's stream back into those.

use std::fmt;

use crate::codec::{encode_end, encode_field, encode_start};
use crate::{FieldParser, ParsedField, Tag};

/// One complete tag-value message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_type: Tag,
    pub fields: Vec<(Tag, String)>,
}

impl Message {
    pub fn new(message_type: impl Into<Tag>) -> Self {
        Self {
            message_type: message_type.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style.
    pub fn with_field(mut self, field: Tag, value: impl ToString) -> Self {
        self.fields.push((field, value.to_string()));
        self
    }

    /// First value recorded for `field`.
    pub fn field(&self, field: Tag) -> Option<&str> {
        self.fields
            .iter()
            .find(|(tag, _)| *tag == field)
            .map(|(_, value)| value.as_str())
    }

    /// First value for `field`, parsed as a decimal integer.
    pub fn field_int(&self, field: Tag) -> Option<i64> {
        self.field(field).and_then(|v| v.parse().ok())
    }

    /// Encodes the message in wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        encode_start(out, self.message_type);
        for (field, value) in &self.fields {
            encode_field(out, *field, value.as_bytes());
        }
        encode_end(out);
    }

    /// Parses every complete message in `bytes`, skipping malformed ones.
    pub fn parse_all(bytes: &[u8]) -> Vec<Message> {
        let mut parser = FieldParser::new();
        let mut collector = MessageCollector::new();
        bytes
            .iter()
            .filter_map(|b| parser.push(*b))
            .filter_map(|field| collector.push(field))
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.message_type)?;
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{field}={value}")?;
        }
        f.write_str("]")
    }
}

/// Assembles [`ParsedField`]s into [`Message`]s.
#[derive(Debug, Default)]
pub struct MessageCollector {
    current: Option<Message>,
    errors: usize,
}

impl MessageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one unit; returns a message when it was completed.
    pub fn push(&mut self, field: ParsedField) -> Option<Message> {
        match field {
            ParsedField::NewMessage { message_type } => {
                self.current = Some(Message::new(message_type));
                None
            }
            ParsedField::Field {
                message_type,
                field,
                value,
            } => {
                if let Some(msg) = self
                    .current
                    .as_mut()
                    .filter(|m| m.message_type == message_type)
                {
                    msg.fields
                        .push((field, String::from_utf8_lossy(value.as_bytes()).into_owned()));
                }
                None
            }
            ParsedField::EndMessage { message_type } => self
                .current
                .take()
                .filter(|m| m.message_type == message_type),
            ParsedField::ProtocolError(_) => {
                self.errors += 1;
                self.current = None;
                None
            }
        }
    }

    /// Protocol errors seen so far.
    pub fn errors(&self) -> usize {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fields;
    use crate::MessageType;

    #[test]
    fn test_builder_and_lookup() {
        let msg = Message::new(MessageType::ValueChange)
            .with_field(fields::ID, 4)
            .with_field(fields::CURRENT_VAL, "-3");
        assert_eq!(msg.field_int(fields::ID), Some(4));
        assert_eq!(msg.field(fields::CURRENT_VAL), Some("-3"));
        assert_eq!(msg.field(fields::NAME), None);
        assert_eq!(msg.to_string(), "VC[ID=4 VC=-3]");
    }

    #[test]
    fn test_parse_all_skips_broken_messages() {
        let mut bytes = b"\x01\x09junk".to_vec();
        bytes.extend(Message::new(MessageType::Heartbeat).encode());
        let parsed = Message::parse_all(&bytes);
        assert_eq!(parsed, vec![Message::new(MessageType::Heartbeat)]);
    }
}
