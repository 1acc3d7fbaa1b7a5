//! Transport abstraction layer for menulink.
//!
//! Provides the [`Transport`] trait: a non-blocking byte pipe to exactly one
//! remote peer. Everything above this layer (the tag-value framer, the
//! protocol connection) is driven by a periodic tick and must never wait on
//! I/O, so every method here returns immediately. "Nothing to read yet" is
//! `Ok(0)`, not a blocked thread.
//!
//! Implementations:
//!
//! - [`MemoryTransport`]: an in-process loopback pair, used for tests and
//!   for hosts that move bytes themselves (serial ports, BLE stacks).
//! - [`TcpTransport`]: a non-blocking `std::net::TcpStream`.
//! - [`WebSocketTransport`]: wraps another transport, performs the HTTP
//!   Upgrade handshake and carries the payload inside RFC 6455 frames.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket envelope and the SHA-1/Base64
//!   handshake codec.

mod error;
mod memory;
mod tcp;
#[cfg(feature = "websocket")]
pub mod codec;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnector, MemoryListener, MemoryTransport};
pub use tcp::{TcpAcceptor, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketState, WebSocketTransport};

/// A byte pipe to one remote peer.
///
/// ## Contract
///
/// - `read` copies whatever is available *right now* into `buf` and returns
///   the count; `Ok(0)` means "call again later".
/// - `write` may accept fewer bytes than offered (`Ok(n)` with `n` smaller
///   than `data.len()`); callers keep the rest and retry on a later tick.
/// - `flush` pushes any internally buffered bytes towards the peer. It is
///   safe to call with nothing pending.
/// - `close` drops the peer. Afterwards `connected()` is `false` until the
///   owner attaches a new peer.
///
/// `Send` is required so a registry of transports can be moved onto the
/// task that drives the tick loop.
pub trait Transport: Send {
    /// Reads available bytes without blocking.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes bytes without blocking, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Pushes buffered output towards the peer.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Whether a peer is currently attached and usable.
    fn connected(&self) -> bool;

    /// Disconnects the peer and discards buffered data.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }

    fn connected(&self) -> bool {
        (**self).connected()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
