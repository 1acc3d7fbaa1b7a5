//! Core types of the tag-value wire format.
//!
//! Every message on the wire is a two-byte message type followed by
//! `key=value|` fields, where each key is also a two-byte tag:
//!
//! ```text
//! 0x01 0x01 'N' 'J' N M = m y r e m o t e | V E = 1 0 1 | 0x02
//! └start┘└proto┘└type┘ └──── field ────┘ └─ field ─┘ └end┘
//! ```
//!
//! This module defines the vocabulary: [`Tag`], the reserved message types
//! ([`MessageType`]), the field tags ([`fields`]), the bounded value buffer
//! ([`FieldValue`]) and the unit the parser yields ([`ParsedField`]).

use std::fmt;

use crate::FramingError;

// ---------------------------------------------------------------------------
// Framing constants
// ---------------------------------------------------------------------------

/// First byte of every message.
pub const START_OF_MESSAGE: u8 = 0x01;

/// Protocol byte following the start byte. Only tag-value (`0x01`) exists.
pub const TAG_VAL_PROTOCOL: u8 = 0x01;

/// Terminates a message in place of the next field key.
pub const END_OF_MESSAGE: u8 = 0x02;

/// Separates one field from the next.
pub const FIELD_TERMINATOR: u8 = b'|';

/// Prefixes a literal `|`, `\` or control byte inside a value.
pub const ESCAPE: u8 = b'\\';

/// Largest value the parser keeps. Longer values are truncated.
pub const MAX_VALUE_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A two-byte message type or field key, such as `NJ` or `ID`.
///
/// Tags are compared and matched as raw bytes. The numeric form used by
/// [`as_u16`](Tag::as_u16) is big-endian: the first character is the high
/// byte and is also the first byte transmitted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 2]);

impl Tag {
    /// Builds a tag from two ASCII characters: `Tag::new(b"NJ")`.
    pub const fn new(bytes: &[u8; 2]) -> Self {
        Self([bytes[0], bytes[1]])
    }

    /// Numeric form, `(first << 8) | second`.
    pub const fn as_u16(self) -> u16 {
        ((self.0[0] as u16) << 8) | self.0[1] as u16
    }

    pub const fn from_u16(value: u16) -> Self {
        Self([(value >> 8) as u8, value as u8])
    }

    pub const fn bytes(self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(u8::is_ascii_graphic) {
            write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
        } else {
            write!(f, "{:#06x}", self.as_u16())
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// The reserved message types.
///
/// The wire carries a raw [`Tag`]; anything not listed here (for example a
/// custom `Z*` message) stays a plain tag and is skipped by receivers that
/// do not know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `NJ`: identifies the sender after connecting.
    Join,
    /// `HB`: keep-alive carrying the sender's heartbeat interval.
    Heartbeat,
    /// `BS`: marks the start and end of a bootstrap.
    Bootstrap,
    /// `BA`
    AnalogBoot,
    /// `BC`
    ActionBoot,
    /// `BM`
    SubMenuBoot,
    /// `BE`
    EnumBoot,
    /// `BB`
    BooleanBoot,
    /// `BT`
    TextBoot,
    /// `BF`
    FloatBoot,
    /// `BR`
    RemoteBoot,
    /// `VC`: a value change, in either direction.
    ValueChange,
    /// `PR`: requests that a new key be stored.
    Pairing,
    /// `AK`: acknowledges a change, join refusal or pairing.
    Acknowledgement,
    /// `DM`: dialog button presses and dialog state.
    Dialog,
}

impl MessageType {
    /// Every reserved type, in wire-tag order of declaration.
    pub const ALL: [MessageType; 15] = [
        MessageType::Join,
        MessageType::Heartbeat,
        MessageType::Bootstrap,
        MessageType::AnalogBoot,
        MessageType::ActionBoot,
        MessageType::SubMenuBoot,
        MessageType::EnumBoot,
        MessageType::BooleanBoot,
        MessageType::TextBoot,
        MessageType::FloatBoot,
        MessageType::RemoteBoot,
        MessageType::ValueChange,
        MessageType::Pairing,
        MessageType::Acknowledgement,
        MessageType::Dialog,
    ];

    pub const fn tag(self) -> Tag {
        match self {
            MessageType::Join => Tag::new(b"NJ"),
            MessageType::Heartbeat => Tag::new(b"HB"),
            MessageType::Bootstrap => Tag::new(b"BS"),
            MessageType::AnalogBoot => Tag::new(b"BA"),
            MessageType::ActionBoot => Tag::new(b"BC"),
            MessageType::SubMenuBoot => Tag::new(b"BM"),
            MessageType::EnumBoot => Tag::new(b"BE"),
            MessageType::BooleanBoot => Tag::new(b"BB"),
            MessageType::TextBoot => Tag::new(b"BT"),
            MessageType::FloatBoot => Tag::new(b"BF"),
            MessageType::RemoteBoot => Tag::new(b"BR"),
            MessageType::ValueChange => Tag::new(b"VC"),
            MessageType::Pairing => Tag::new(b"PR"),
            MessageType::Acknowledgement => Tag::new(b"AK"),
            MessageType::Dialog => Tag::new(b"DM"),
        }
    }

    /// Looks up a reserved type; `None` for unknown or custom tags.
    pub fn from_tag(tag: Tag) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl From<MessageType> for Tag {
    fn from(value: MessageType) -> Self {
        value.tag()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tag().fmt(f)
    }
}

/// Field tags used by the reserved messages.
pub mod fields {
    use super::Tag;

    pub const MSG_TYPE: Tag = Tag::new(b"MT");
    pub const NAME: Tag = Tag::new(b"NM");
    /// API version as `major * 100 + minor`.
    pub const VERSION: Tag = Tag::new(b"VE");
    pub const PLATFORM: Tag = Tag::new(b"PF");
    pub const UUID: Tag = Tag::new(b"UU");
    /// `START` or `END` inside a `BS` message.
    pub const BOOT_TYPE: Tag = Tag::new(b"BT");
    pub const ID: Tag = Tag::new(b"ID");
    pub const EEPROM: Tag = Tag::new(b"IE");
    pub const READ_ONLY: Tag = Tag::new(b"RO");
    pub const VISIBLE: Tag = Tag::new(b"VI");
    pub const PARENT: Tag = Tag::new(b"PI");
    pub const ANALOG_MAX: Tag = Tag::new(b"AM");
    pub const ANALOG_OFFSET: Tag = Tag::new(b"AO");
    pub const ANALOG_DIVISOR: Tag = Tag::new(b"AD");
    pub const ANALOG_UNIT: Tag = Tag::new(b"AU");
    pub const CURRENT_VAL: Tag = Tag::new(b"VC");
    pub const BOOL_NAMING: Tag = Tag::new(b"BN");
    pub const NO_OF_CHOICES: Tag = Tag::new(b"NC");
    /// 0 delta, 1 absolute.
    pub const CHANGE_TYPE: Tag = Tag::new(b"TC");
    pub const MAX_LEN: Tag = Tag::new(b"ML");
    pub const REMOTE_NO: Tag = Tag::new(b"RN");
    pub const FLOAT_DP: Tag = Tag::new(b"FD");
    /// Echoed in acknowledgements, hex encoded.
    pub const CORRELATION: Tag = Tag::new(b"IC");
    pub const ACK_STATUS: Tag = Tag::new(b"ST");
    pub const HB_INTERVAL: Tag = Tag::new(b"HI");
    pub const HB_MODE: Tag = Tag::new(b"HR");
    pub const BUTTON: Tag = Tag::new(b"BU");
    pub const DIALOG_MODE: Tag = Tag::new(b"MO");
    /// Header line of a dialog.
    pub const HEADER: Tag = Tag::new(b"HF");

    /// Key of the `index`-th enum choice: `CA`, `CB`, ... `CZ`.
    ///
    /// Returns `None` past the 26th choice.
    pub fn choice(index: usize) -> Option<Tag> {
        u8::try_from(index)
            .ok()
            .filter(|i| *i < 26)
            .map(|i| Tag([b'C', b'A' + i]))
    }
}

// ---------------------------------------------------------------------------
// Wire-level enumerations
// ---------------------------------------------------------------------------

/// Result code carried in the `ST` field of an `AK` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckStatus {
    Success,
    ValueRange,
    IdNotFound,
    CredentialsInvalid,
    Unknown,
}

impl AckStatus {
    pub const fn code(self) -> i64 {
        match self {
            AckStatus::Success => 0,
            AckStatus::ValueRange => 1,
            AckStatus::IdNotFound => 2,
            AckStatus::CredentialsInvalid => 3,
            AckStatus::Unknown => 10000,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => AckStatus::Success,
            1 => AckStatus::ValueRange,
            2 => AckStatus::IdNotFound,
            3 => AckStatus::CredentialsInvalid,
            _ => AckStatus::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self == AckStatus::Success
    }
}

/// How the `VC` field of a value change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChangeKind {
    /// Add the (signed) value to the current value.
    #[default]
    Delta,
    /// Replace the current value.
    Absolute,
}

impl ChangeKind {
    pub const fn code(self) -> i64 {
        match self {
            ChangeKind::Delta => 0,
            ChangeKind::Absolute => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ChangeKind::Delta),
            1 => Some(ChangeKind::Absolute),
            _ => None,
        }
    }
}

/// The `HR` field of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeartbeatMode {
    #[default]
    Normal,
    /// The peer (re)started and wants our join again.
    Start,
    /// The peer is about to close the connection.
    End,
}

impl HeartbeatMode {
    pub const fn code(self) -> i64 {
        match self {
            HeartbeatMode::Normal => 0,
            HeartbeatMode::Start => 1,
            HeartbeatMode::End => 2,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => HeartbeatMode::Start,
            2 => HeartbeatMode::End,
            _ => HeartbeatMode::Normal,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A field value of at most [`MAX_VALUE_LEN`] bytes, stored inline.
///
/// Pushing past the capacity is refused rather than overflowing, which is
/// how over-length values end up truncated.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldValue(heapless::Vec<u8, MAX_VALUE_LEN>);

impl FieldValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a byte; returns `false` once the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        self.0.push(byte).is_ok()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The value as text. Stops at the first invalid UTF-8 sequence, which
    /// can only appear when truncation split a multi-byte character.
    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.0) {
            Ok(s) => s,
            Err(e) => {
                let valid = &self.0[..e.valid_up_to()];
                // `valid_up_to` marks the end of a well-formed prefix.
                std::str::from_utf8(valid).unwrap_or_default()
            }
        }
    }

    /// Parses the value as a signed decimal integer.
    pub fn as_int(&self) -> Option<i64> {
        self.as_str().trim().parse().ok()
    }

    /// Parses the value as hexadecimal, as used by correlation ids.
    pub fn as_hex(&self) -> Option<u32> {
        u32::from_str_radix(self.as_str().trim(), 16).ok()
    }
}

impl From<&str> for FieldValue {
    /// Copies up to [`MAX_VALUE_LEN`] bytes of `value`.
    fn from(value: &str) -> Self {
        let mut out = Self::new();
        for &b in value.as_bytes() {
            if !out.push(b) {
                break;
            }
        }
        out
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

// ---------------------------------------------------------------------------
// ParsedField
// ---------------------------------------------------------------------------

/// One unit decoded from the byte stream.
///
/// A `Field` is only ever produced between the `NewMessage` and the
/// `EndMessage` of the same message type. Intermediate parser states are
/// internal to [`FieldParser`](crate::FieldParser) and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedField {
    NewMessage {
        message_type: Tag,
    },
    Field {
        message_type: Tag,
        field: Tag,
        value: FieldValue,
    },
    EndMessage {
        message_type: Tag,
    },
    /// The stream was malformed. The parser has already dropped the
    /// current message and will resume at the next start byte.
    ProtocolError(FramingError),
}

impl ParsedField {
    /// The message type this unit belongs to, if any.
    pub fn message_type(&self) -> Option<Tag> {
        match self {
            ParsedField::NewMessage { message_type }
            | ParsedField::Field { message_type, .. }
            | ParsedField::EndMessage { message_type } => Some(*message_type),
            ParsedField::ProtocolError(_) => None,
        }
    }
}
