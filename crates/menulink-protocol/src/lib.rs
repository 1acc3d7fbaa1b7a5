//! Wire protocol for menulink.
//!
//! This crate defines the tag-value "language" that a menu host and its
//! remote controllers speak:
//!
//! - **Types** ([`Tag`], [`MessageType`], [`fields`], [`FieldValue`],
//!   [`ParsedField`]): the vocabulary of the wire format.
//! - **Codec** ([`FieldParser`], [`codec`] encode helpers): a resumable
//!   byte-at-a-time parser and the matching encoder.
//! - **Framer** ([`ByteFramer`]): the codec attached to a
//!   [`Transport`](menulink_transport::Transport), with buffered,
//!   partial-write-safe output.
//! - **Messages** ([`Message`], [`MessageCollector`]): whole messages as
//!   values, for clients and tests.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → ByteFramer (ParsedField) → dispatch (menulink crate)
//! ```
//!
//! The protocol layer knows nothing about menus or sessions. It only turns
//! bytes into fields and fields into bytes.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

pub mod codec;
mod error;
mod framer;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::FieldParser;
pub use error::{FramingError, ProtocolError};
pub use framer::ByteFramer;
pub use message::{Message, MessageCollector};
pub use types::{
    AckStatus, ChangeKind, END_OF_MESSAGE, FieldValue, HeartbeatMode, MAX_VALUE_LEN, MessageType,
    ParsedField, START_OF_MESSAGE, TAG_VAL_PROTOCOL, Tag, fields,
};
