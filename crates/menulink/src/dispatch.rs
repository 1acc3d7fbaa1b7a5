//! Routing incoming fields to per-message handlers.
//!
//! A message arrives as a `NewMessage`, a run of `Field`s and an
//! `EndMessage`. The [`MessageDispatchTable`] picks a handler when the
//! message starts, lets it fold each field into a
//! [`ProtocolMessageContext`], and hands the finished context back at the
//! end so the connection can act on the whole message at once.

use std::mem;

use menulink_menu::{ButtonType, ItemId};
use menulink_protocol::{ChangeKind, FieldValue, HeartbeatMode, MessageType, ParsedField, Tag, fields};
use menulink_session::Platform;

// ---------------------------------------------------------------------------
// Message contexts
// ---------------------------------------------------------------------------

/// Fields of a join (`NJ`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinRequest {
    pub name: String,
    /// `major * 100 + minor`.
    pub version: i64,
    pub platform: Platform,
    /// `None` if the remote sent no key at all.
    pub uuid: Option<String>,
}

/// Fields of a value change (`VC`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueChangeRequest {
    pub item_id: Option<ItemId>,
    pub change_kind: ChangeKind,
    /// Echoed back in the acknowledgement; 0 if none was sent.
    pub correlation: u32,
    pub value: String,
}

/// What the current message has said so far.
///
/// Reset when a message starts, consumed when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolMessageContext {
    #[default]
    Empty,
    Join(JoinRequest),
    ValueChange(ValueChangeRequest),
    Pairing {
        name: String,
        uuid: String,
    },
    Dialog {
        button: ButtonType,
        mode: Option<char>,
        correlation: u32,
    },
    Heartbeat {
        mode: HeartbeatMode,
        interval_ms: Option<i64>,
    },
}

impl ProtocolMessageContext {
    fn start(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Join => Self::Join(JoinRequest::default()),
            MessageType::ValueChange => Self::ValueChange(ValueChangeRequest::default()),
            MessageType::Pairing => Self::Pairing {
                name: String::new(),
                uuid: String::new(),
            },
            MessageType::Dialog => Self::Dialog {
                button: ButtonType::None,
                mode: None,
                correlation: 0,
            },
            MessageType::Heartbeat => Self::Heartbeat {
                mode: HeartbeatMode::Normal,
                interval_ms: None,
            },
            _ => Self::Empty,
        }
    }

    /// Folds one field into the context. Fields a handler does not know
    /// are ignored.
    fn apply_field(&mut self, field: Tag, value: &FieldValue) {
        match self {
            Self::Join(join) => match field {
                fields::NAME => join.name = value.as_str().to_string(),
                fields::VERSION => join.version = value.as_int().unwrap_or(0),
                fields::PLATFORM => {
                    join.platform = value.as_int().map(Platform::from_code).unwrap_or_default()
                }
                fields::UUID => join.uuid = Some(value.as_str().to_string()),
                _ => {}
            },
            Self::ValueChange(change) => match field {
                fields::ID => {
                    change.item_id = value
                        .as_int()
                        .and_then(|id| u16::try_from(id).ok())
                        .map(ItemId)
                }
                fields::CHANGE_TYPE => {
                    change.change_kind = value
                        .as_int()
                        .and_then(ChangeKind::from_code)
                        .unwrap_or_default()
                }
                fields::CURRENT_VAL => change.value = value.as_str().to_string(),
                fields::CORRELATION => change.correlation = value.as_hex().unwrap_or(0),
                _ => {}
            },
            Self::Pairing { name, uuid } => match field {
                fields::NAME => *name = value.as_str().to_string(),
                fields::UUID => *uuid = value.as_str().to_string(),
                _ => {}
            },
            Self::Dialog {
                button,
                mode,
                correlation,
            } => match field {
                fields::BUTTON => *button = ButtonType::from_code(value.as_int().unwrap_or(0)),
                fields::DIALOG_MODE => *mode = value.as_str().chars().next(),
                fields::CORRELATION => *correlation = value.as_hex().unwrap_or(0),
                _ => {}
            },
            Self::Heartbeat { mode, interval_ms } => match field {
                fields::HB_MODE => *mode = HeartbeatMode::from_code(value.as_int().unwrap_or(0)),
                fields::HB_INTERVAL => *interval_ms = value.as_int(),
                _ => {}
            },
            Self::Empty => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// Maps message types to handlers and tracks the message in progress.
#[derive(Debug, Default)]
pub struct MessageDispatchTable {
    active: Option<MessageType>,
    context: ProtocolMessageContext,
}

impl MessageDispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handled message type for `tag`, or `None` if there is no
    /// handler (including every custom `Z*` type).
    pub fn handler_for(tag: Tag) -> Option<MessageType> {
        match MessageType::from_tag(tag)? {
            mt @ (MessageType::Join
            | MessageType::Heartbeat
            | MessageType::ValueChange
            | MessageType::Pairing
            | MessageType::Dialog) => Some(mt),
            _ => None,
        }
    }

    /// Messages processed before the remote has authenticated.
    pub fn allowed_before_auth(message_type: MessageType) -> bool {
        matches!(
            message_type,
            MessageType::Join | MessageType::Pairing | MessageType::Heartbeat
        )
    }

    /// The message currently being collected.
    pub fn active(&self) -> Option<MessageType> {
        self.active
    }

    pub fn context(&self) -> &ProtocolMessageContext {
        &self.context
    }

    /// Feeds one parsed unit. Returns the finished context when a handled
    /// message ends.
    pub fn dispatch(&mut self, field: &ParsedField, authenticated: bool) -> Option<ProtocolMessageContext> {
        match field {
            ParsedField::NewMessage { message_type } => {
                self.reset();
                match Self::handler_for(*message_type) {
                    Some(mt) if authenticated || Self::allowed_before_auth(mt) => {
                        self.active = Some(mt);
                        self.context = ProtocolMessageContext::start(mt);
                    }
                    Some(mt) => tracing::debug!(msg_type = %mt, "ignored before authentication"),
                    None => tracing::debug!(msg_type = %message_type, "no handler, skipping message"),
                }
                None
            }
            ParsedField::Field { field, value, .. } => {
                if self.active.is_some() {
                    tracing::trace!(%field, %value, "field");
                    self.context.apply_field(*field, value);
                }
                None
            }
            ParsedField::EndMessage { .. } => {
                self.active.take()?;
                Some(mem::take(&mut self.context))
            }
            ParsedField::ProtocolError(_) => {
                self.reset();
                None
            }
        }
    }

    /// Drops any half-received message.
    pub fn reset(&mut self) {
        self.active = None;
        self.context = ProtocolMessageContext::Empty;
    }
}

#[cfg(test)]
mod tests {
    use menulink_protocol::{FieldParser, FramingError, Message};

    use super::*;

    /// Runs a message through the parser and the table.
    fn run(table: &mut MessageDispatchTable, msg: &Message, authenticated: bool) -> Vec<ProtocolMessageContext> {
        let mut parser = FieldParser::new();
        msg.encode()
            .iter()
            .filter_map(|b| parser.push(*b))
            .filter_map(|f| table.dispatch(&f, authenticated))
            .collect()
    }

    #[test]
    fn test_join_context() {
        let mut table = MessageDispatchTable::new();
        let msg = Message::new(MessageType::Join)
            .with_field(fields::NAME, "dev")
            .with_field(fields::VERSION, 1203)
            .with_field(fields::PLATFORM, 2)
            .with_field(fields::UUID, "abc-123");
        let out = run(&mut table, &msg, false);
        assert_eq!(
            out,
            [ProtocolMessageContext::Join(JoinRequest {
                name: "dev".into(),
                version: 1203,
                platform: Platform::Arduino32Bit,
                uuid: Some("abc-123".into()),
            })]
        );
        assert_eq!(table.active(), None);
        assert_eq!(table.context(), &ProtocolMessageContext::Empty);
    }

    #[test]
    fn test_value_change_context() {
        let mut table = MessageDispatchTable::new();
        let msg = Message::new(MessageType::ValueChange)
            .with_field(fields::ID, 4)
            .with_field(fields::CHANGE_TYPE, 0)
            .with_field(fields::CURRENT_VAL, -3)
            .with_field(fields::CORRELATION, "1a2b");
        let out = run(&mut table, &msg, true);
        assert_eq!(
            out,
            [ProtocolMessageContext::ValueChange(ValueChangeRequest {
                item_id: Some(ItemId(4)),
                change_kind: ChangeKind::Delta,
                correlation: 0x1a2b,
                value: "-3".into(),
            })]
        );
    }

    #[test]
    fn test_auth_gate_drops_value_changes() {
        let mut table = MessageDispatchTable::new();
        let change = Message::new(MessageType::ValueChange).with_field(fields::ID, 1);
        assert!(run(&mut table, &change, false).is_empty());

        let pairing = Message::new(MessageType::Pairing)
            .with_field(fields::NAME, "phone")
            .with_field(fields::UUID, "u");
        assert_eq!(
            run(&mut table, &pairing, false),
            [ProtocolMessageContext::Pairing {
                name: "phone".into(),
                uuid: "u".into()
            }]
        );
    }

    #[test]
    fn test_unknown_and_unhandled_types_are_skipped() {
        let mut table = MessageDispatchTable::new();
        let custom = Message::new(Tag::new(b"ZX")).with_field(fields::ID, 1);
        assert!(run(&mut table, &custom, true).is_empty());
        // Boot messages are only ever sent by a host.
        let boot = Message::new(MessageType::AnalogBoot).with_field(fields::ID, 1);
        assert!(run(&mut table, &boot, true).is_empty());
    }

    #[test]
    fn test_dialog_and_heartbeat_contexts() {
        let mut table = MessageDispatchTable::new();
        let dialog = Message::new(MessageType::Dialog)
            .with_field(fields::DIALOG_MODE, "A")
            .with_field(fields::BUTTON, 1)
            .with_field(fields::CORRELATION, "ff");
        assert_eq!(
            run(&mut table, &dialog, true),
            [ProtocolMessageContext::Dialog {
                button: ButtonType::Ok,
                mode: Some('A'),
                correlation: 0xff,
            }]
        );

        let hb = Message::new(MessageType::Heartbeat)
            .with_field(fields::HB_INTERVAL, 1500)
            .with_field(fields::HB_MODE, 1);
        assert_eq!(
            run(&mut table, &hb, false),
            [ProtocolMessageContext::Heartbeat {
                mode: HeartbeatMode::Start,
                interval_ms: Some(1500),
            }]
        );
    }

    #[test]
    fn test_protocol_error_discards_message() {
        let mut table = MessageDispatchTable::new();
        table.dispatch(
            &ParsedField::NewMessage {
                message_type: MessageType::Join.tag(),
            },
            false,
        );
        assert_eq!(table.active(), Some(MessageType::Join));
        table.dispatch(
            &ParsedField::ProtocolError(FramingError::UnsupportedProtocol(9)),
            false,
        );
        assert_eq!(table.active(), None);
        let end = ParsedField::EndMessage {
            message_type: MessageType::Join.tag(),
        };
        assert_eq!(table.dispatch(&end, false), None);
    }
}
