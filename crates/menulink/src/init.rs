//! How a connection slot gets a peer.
//!
//! The registry does not know how transports find peers. It asks the
//! slot's [`InitStrategy`] instead: once to set up (bind a listener, open
//! a port) and then, whenever the transport is idle, to try to attach a
//! new peer.

use std::net::SocketAddr;
use std::sync::Arc;
#[cfg(feature = "websocket")]
use std::time::{Duration, Instant};

use menulink_transport::{MemoryListener, MemoryTransport, TcpAcceptor, TcpTransport, Transport, TransportError};
#[cfg(feature = "websocket")]
use menulink_transport::{WebSocketState, WebSocketTransport};

/// Brings a transport from "nothing attached" to "peer connected".
///
/// Every method is called from the tick and must not block.
pub trait InitStrategy<T>: Send {
    /// Whether [`attempt_initialisation`](Self::attempt_initialisation)
    /// has succeeded.
    fn is_initialised(&self) -> bool;

    /// One-off setup such as binding a listening socket. Called every tick
    /// until it succeeds.
    fn attempt_initialisation(&mut self) -> Result<(), TransportError>;

    /// Tries to attach a new peer to `transport`. Returns `Ok(true)` once
    /// the transport is connected.
    fn attempt_new_connection(&mut self, transport: &mut T) -> Result<bool, TransportError>;
}

// ---------------------------------------------------------------------------
// AlwaysReady
// ---------------------------------------------------------------------------

/// For transports that are connected from the start, such as a serial
/// line or an in-memory pair. Never attaches anything new.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl<T: Transport> InitStrategy<T> for AlwaysReady {
    fn is_initialised(&self) -> bool {
        true
    }

    fn attempt_initialisation(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn attempt_new_connection(&mut self, transport: &mut T) -> Result<bool, TransportError> {
        Ok(transport.connected())
    }
}

// ---------------------------------------------------------------------------
// MemoryInitialisation
// ---------------------------------------------------------------------------

/// Accepts in-memory peers from a [`MemoryListener`]. Useful for tests
/// and for embedding a remote in the same process.
#[derive(Debug, Clone)]
pub struct MemoryInitialisation {
    listener: MemoryListener,
}

impl MemoryInitialisation {
    pub fn new(listener: MemoryListener) -> Self {
        Self { listener }
    }
}

impl InitStrategy<MemoryTransport> for MemoryInitialisation {
    fn is_initialised(&self) -> bool {
        true
    }

    fn attempt_initialisation(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn attempt_new_connection(&mut self, transport: &mut MemoryTransport) -> Result<bool, TransportError> {
        match self.listener.accept() {
            Some(peer) => {
                *transport = peer;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// TcpInitialisation
// ---------------------------------------------------------------------------

/// Listens on a TCP port and attaches accepted streams.
///
/// Several slots can serve the same port by sharing one acceptor with
/// [`TcpInitialisation::shared`]; each accepted stream goes to whichever
/// idle slot asks first.
#[derive(Debug, Clone)]
pub struct TcpInitialisation {
    addr: SocketAddr,
    acceptor: Option<Arc<TcpAcceptor>>,
}

impl TcpInitialisation {
    /// Binds `addr` lazily, on the first tick.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, acceptor: None }
    }

    /// Uses an acceptor that is already bound.
    pub fn shared(acceptor: Arc<TcpAcceptor>) -> Result<Self, TransportError> {
        Ok(Self {
            addr: acceptor.local_addr()?,
            acceptor: Some(acceptor),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Binds once; returns the stream accepted this tick, if any.
fn accept_stream(
    acceptor: &mut Option<Arc<TcpAcceptor>>,
    addr: SocketAddr,
) -> Result<Option<std::net::TcpStream>, TransportError> {
    if acceptor.is_none() {
        *acceptor = Some(Arc::new(TcpAcceptor::bind(addr)?));
    }
    match acceptor {
        Some(acceptor) => acceptor.accept(),
        None => Ok(None),
    }
}

impl InitStrategy<TcpTransport> for TcpInitialisation {
    fn is_initialised(&self) -> bool {
        self.acceptor.is_some()
    }

    fn attempt_initialisation(&mut self) -> Result<(), TransportError> {
        if self.acceptor.is_none() {
            self.acceptor = Some(Arc::new(TcpAcceptor::bind(self.addr)?));
        }
        Ok(())
    }

    fn attempt_new_connection(&mut self, transport: &mut TcpTransport) -> Result<bool, TransportError> {
        match accept_stream(&mut self.acceptor, self.addr)? {
            Some(stream) => {
                transport.attach(stream)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocketInitialisation
// ---------------------------------------------------------------------------

/// Accepts TCP streams and completes the WebSocket upgrade on them.
///
/// The upgrade spans as many ticks as the client needs to send its
/// request; the slot only counts as connected once the `101` response is
/// out. A client that has not finished the upgrade within the handshake
/// timeout is dropped so the slot can accept someone else.
#[cfg(feature = "websocket")]
#[derive(Debug, Clone)]
pub struct WebSocketInitialisation {
    tcp: TcpInitialisation,
    handshake_timeout: Duration,
    handshake_started: Option<Instant>,
}

/// How long a client may take to send a complete upgrade request.
#[cfg(feature = "websocket")]
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(feature = "websocket")]
impl WebSocketInitialisation {
    pub fn new(addr: SocketAddr) -> Self {
        Self::from_tcp(TcpInitialisation::new(addr))
    }

    pub fn shared(acceptor: Arc<TcpAcceptor>) -> Result<Self, TransportError> {
        Ok(Self::from_tcp(TcpInitialisation::shared(acceptor)?))
    }

    fn from_tcp(tcp: TcpInitialisation) -> Self {
        Self {
            tcp,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshake_started: None,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

#[cfg(feature = "websocket")]
impl InitStrategy<WebSocketTransport<TcpTransport>> for WebSocketInitialisation {
    fn is_initialised(&self) -> bool {
        self.tcp.is_initialised()
    }

    fn attempt_initialisation(&mut self) -> Result<(), TransportError> {
        self.tcp.attempt_initialisation()
    }

    fn attempt_new_connection(
        &mut self,
        transport: &mut WebSocketTransport<TcpTransport>,
    ) -> Result<bool, TransportError> {
        let handshaking = transport.inner().connected()
            && matches!(
                transport.state(),
                WebSocketState::NotConnected | WebSocketState::HttpRequestReceived
            );
        if handshaking {
            let started = *self.handshake_started.get_or_insert_with(Instant::now);
            if started.elapsed() >= self.handshake_timeout {
                tracing::warn!(addr = %self.tcp.addr, timeout = ?self.handshake_timeout, "websocket upgrade timed out");
                transport.inner_mut().close();
                transport.restart();
                self.handshake_started = None;
                return Ok(false);
            }
        } else {
            let Some(stream) = accept_stream(&mut self.tcp.acceptor, self.tcp.addr)? else {
                return Ok(false);
            };
            transport.restart();
            transport.inner_mut().attach(stream)?;
            self.handshake_started = Some(Instant::now());
        }
        match transport.poll_handshake() {
            Ok(done) => {
                if done {
                    self.handshake_started = None;
                }
                Ok(done)
            }
            Err(error) => {
                transport.restart();
                self.handshake_started = None;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_ready_reflects_transport() {
        let (mut a, mut b) = MemoryTransport::pair();
        let mut init = AlwaysReady;
        assert!(InitStrategy::<MemoryTransport>::is_initialised(&init));
        assert!(init.attempt_new_connection(&mut a).unwrap());
        b.close();
        assert!(!init.attempt_new_connection(&mut a).unwrap());
    }

    #[test]
    fn test_memory_initialisation_attaches_peer() {
        let (listener, connector) = MemoryListener::new();
        let mut init = MemoryInitialisation::new(listener);
        let mut slot = MemoryTransport::disconnected();
        assert!(!init.attempt_new_connection(&mut slot).unwrap());

        let mut client = connector.connect();
        assert!(init.attempt_new_connection(&mut slot).unwrap());
        client.write(b"hi").unwrap();
        assert_eq!(slot.pending(), 2);
    }

    #[test]
    fn test_tcp_initialisation_binds_lazily() {
        let mut init = TcpInitialisation::new("127.0.0.1:0".parse().unwrap());
        assert!(!init.is_initialised());
        init.attempt_initialisation().unwrap();
        assert!(init.is_initialised());
        let mut transport = TcpTransport::new();
        assert!(!init.attempt_new_connection(&mut transport).unwrap());
    }
}
