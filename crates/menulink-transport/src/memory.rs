//! In-process loopback transport.
//!
//! A [`MemoryTransport`] pair behaves like the two ends of a socket: bytes
//! written on one end become readable on the other. Both ends share the
//! pipes through `Arc<Mutex<..>>`, so either end may live on another thread.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Transport, TransportError};

#[derive(Debug, Default)]
struct Pipe {
    data: VecDeque<u8>,
    open: bool,
}

type SharedPipe = Arc<Mutex<Pipe>>;

fn lock(pipe: &SharedPipe) -> MutexGuard<'_, Pipe> {
    // A poisoned pipe still holds valid bytes; keep going.
    pipe.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One end of an in-memory byte pipe.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inbound: SharedPipe,
    outbound: SharedPipe,
    /// Caps how many bytes a single `write` accepts. `None` = unlimited.
    write_limit: Option<usize>,
}

impl MemoryTransport {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(Pipe {
            data: VecDeque::new(),
            open: true,
        }));
        let b_to_a = Arc::new(Mutex::new(Pipe {
            data: VecDeque::new(),
            open: true,
        }));
        let a = Self {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            write_limit: None,
        };
        let b = Self {
            inbound: a_to_b,
            outbound: b_to_a,
            write_limit: None,
        };
        (a, b)
    }

    /// Creates an end with no peer; `connected()` is `false`.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Limits every `write` to at most `limit` bytes, to exercise
    /// partial-write handling in the layers above.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Queues bytes as if the peer had written them.
    pub fn inject(&self, data: &[u8]) {
        lock(&self.inbound).data.extend(data);
    }

    /// Takes everything the peer has written to us so far.
    pub fn drain(&self) -> Vec<u8> {
        lock(&self.inbound).data.drain(..).collect()
    }

    /// Number of bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        lock(&self.inbound).data.len()
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut pipe = lock(&self.inbound);
        let n = buf.len().min(pipe.data.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut pipe = lock(&self.outbound);
        if !pipe.open {
            return Err(TransportError::NotConnected);
        }
        let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
        pipe.data.extend(&data[..n]);
        Ok(n)
    }

    fn connected(&self) -> bool {
        // One lock at a time: the peer takes the same two locks in the
        // opposite order.
        let inbound_open = lock(&self.inbound).open;
        let outbound_open = lock(&self.outbound).open;
        inbound_open && outbound_open
    }

    /// Unread input is discarded. Bytes already written stay readable by
    /// the peer, as with a socket that sent them before closing.
    fn close(&mut self) {
        {
            let mut inbound = lock(&self.inbound);
            inbound.open = false;
            inbound.data.clear();
        }
        lock(&self.outbound).open = false;
    }
}

// ---------------------------------------------------------------------------
// Listener / connector
// ---------------------------------------------------------------------------

/// Accept side of an in-memory "server socket".
///
/// Each [`MemoryConnector::connect`] queues the server end of a fresh pair,
/// which [`MemoryListener::accept`] hands out in order.
#[derive(Debug, Clone)]
pub struct MemoryListener {
    backlog: Arc<Mutex<VecDeque<MemoryTransport>>>,
}

/// Client side paired with a [`MemoryListener`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    backlog: Arc<Mutex<VecDeque<MemoryTransport>>>,
}

impl MemoryListener {
    /// Creates a listener and the connector that feeds it.
    pub fn new() -> (Self, MemoryConnector) {
        let backlog = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                backlog: Arc::clone(&backlog),
            },
            MemoryConnector { backlog },
        )
    }

    /// Returns the next pending server end, if a client has connected.
    pub fn accept(&self) -> Option<MemoryTransport> {
        self.backlog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

impl MemoryConnector {
    /// Connects a new client, returning the client end.
    pub fn connect(&self) -> MemoryTransport {
        let (server, client) = MemoryTransport::pair();
        self.backlog
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(server);
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_moves_bytes_both_ways() {
        let (mut a, mut b) = MemoryTransport::pair();
        assert_eq!(a.write(b"ping").unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");

        b.write(b"pong").unwrap();
        assert_eq!(a.drain(), b"pong");
    }

    #[test]
    fn test_read_with_nothing_pending_returns_zero() {
        let (mut a, _b) = MemoryTransport::pair();
        let mut buf = [0u8; 4];
        assert_eq!(a.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_close_disconnects_both_ends() {
        let (mut a, mut b) = MemoryTransport::pair();
        assert!(a.connected() && b.connected());
        a.close();
        assert!(!a.connected());
        assert!(!b.connected());
        assert!(matches!(b.write(b"x"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_bytes_written_before_close_stay_readable() {
        let (mut a, b) = MemoryTransport::pair();
        a.write(b"bye").unwrap();
        a.close();
        assert_eq!(b.drain(), b"bye");
    }

    #[test]
    fn test_write_limit_accepts_partial_writes() {
        let (a, b) = MemoryTransport::pair();
        let mut a = a.with_write_limit(3);
        assert_eq!(a.write(b"abcdef").unwrap(), 3);
        assert_eq!(b.drain(), b"abc");
    }

    #[test]
    fn test_disconnected_end_is_not_connected() {
        assert!(!MemoryTransport::disconnected().connected());
    }

    #[test]
    fn test_listener_hands_out_connections_in_order() {
        let (listener, connector) = MemoryListener::new();
        assert!(listener.accept().is_none());

        let client = connector.connect();
        let mut server = listener.accept().expect("pending connection");
        client.clone().write(b"hi").unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(server.read(&mut buf).unwrap(), 2);
        assert!(listener.accept().is_none());
    }
}
