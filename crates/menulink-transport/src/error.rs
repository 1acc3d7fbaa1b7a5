/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An operation needed a live peer but none is attached.
    #[error("transport not connected")]
    NotConnected,

    /// The peer went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The underlying socket reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The HTTP upgrade request was not a valid WebSocket upgrade.
    #[error("websocket handshake failed: {0}")]
    HandshakeFailed(String),

    /// A WebSocket frame announced more payload than the read buffer holds.
    #[error("websocket frame of {len} bytes exceeds buffer of {max}")]
    FrameTooLarge { len: u64, max: usize },

    /// A WebSocket frame carried an opcode we do not handle.
    #[error("unexpected websocket opcode {0:#x}")]
    UnexpectedOpcode(u8),

    /// Client-to-server frames must be masked (RFC 6455 §5.3).
    #[error("client frame was not masked")]
    UnmaskedFrame,
}
