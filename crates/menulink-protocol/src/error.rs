//! Error types for the protocol layer.
//!
//! Framing problems are not returned as `Err`: the parser reports them
//! in-band as [`ParsedField::ProtocolError`](crate::ParsedField) so the
//! connection can count them, log them and carry on with the next message.
//! [`ProtocolError`] covers the cases that do propagate with `?`.

use menulink_transport::TransportError;

use crate::Tag;

/// A malformed tag-value stream.
///
/// After any of these the parser discards the current message and waits for
/// the next start byte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// The byte after the start byte was not the tag-value protocol.
    #[error("unsupported protocol byte {0:#04x}")]
    UnsupportedProtocol(u8),

    /// A field key was not followed by `=`.
    #[error("field {field} is missing '='")]
    MissingEquals { field: Tag },

    /// A control byte arrived where a tag or value byte was expected.
    #[error("unexpected byte {byte:#04x} while reading {state}")]
    UnexpectedByte { state: &'static str, byte: u8 },
}

/// Errors that can occur when driving a [`ByteFramer`](crate::ByteFramer).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
