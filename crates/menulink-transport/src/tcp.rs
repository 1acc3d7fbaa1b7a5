//! Non-blocking TCP transport built on `std::net`.
//!
//! The protocol core is tick driven, so sockets are switched to
//! non-blocking mode and `WouldBlock` is reported as "no bytes yet".

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::{Transport, TransportError};

/// A [`Transport`] over one TCP stream. Starts (and ends) detached.
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
}

impl TcpTransport {
    /// Creates a transport with no stream attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let mut transport = Self::new();
        transport.attach(stream)?;
        Ok(transport)
    }

    /// Attaches a freshly accepted stream, replacing any previous one.
    pub fn attach(&mut self, stream: TcpStream) -> Result<(), TransportError> {
        stream.set_nonblocking(true)?;
        // Tag-value messages are small and latency matters more than
        // packet count.
        stream.set_nodelay(true)?;
        self.peer = stream.peer_addr().ok();
        self.stream = Some(stream);
        tracing::debug!(peer = ?self.peer, "tcp stream attached");
        Ok(())
    }

    /// Address of the attached peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn drop_stream(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            tracing::debug!(peer = ?self.peer, reason, "tcp stream dropped");
        }
        self.peer = None;
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.drop_stream("eof");
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => {
                self.drop_stream("read error");
                Err(TransportError::Io(e))
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        match stream.write(data) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => {
                self.drop_stream("write error");
                Err(TransportError::Io(e))
            }
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        match stream.flush() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                self.drop_stream("flush error");
                Err(TransportError::Io(e))
            }
        }
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.as_ref() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.drop_stream("closed");
    }
}

/// A non-blocking listening socket.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds a listener and switches it to non-blocking accepts.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(TransportError::AcceptFailed)?;
        listener
            .set_nonblocking(true)
            .map_err(TransportError::AcceptFailed)?;
        let local = listener.local_addr().ok();
        tracing::info!(addr = ?local, "tcp acceptor listening");
        Ok(Self { listener })
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Io)
    }

    /// Accepts a pending connection, or `Ok(None)` if none is waiting.
    pub fn accept(&self) -> Result<Option<TcpStream>, TransportError> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                tracing::debug!(%addr, "accepted tcp connection");
                Ok(Some(stream))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::AcceptFailed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    /// Polls `f` until it yields `Some` or a second has passed.
    fn poll<T>(mut f: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            if let Some(v) = f() {
                return v;
            }
            assert!(Instant::now() < deadline, "timed out polling");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_detached_transport_is_not_connected() {
        let mut t = TcpTransport::new();
        assert!(!t.connected());
        let mut buf = [0u8; 4];
        assert_eq!(t.read(&mut buf).unwrap(), 0);
        assert!(matches!(t.write(b"x"), Err(TransportError::NotConnected)));
        t.flush().unwrap();
    }

    #[test]
    fn test_accept_and_exchange_bytes() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        assert!(acceptor.accept().unwrap().is_none());

        let addr = acceptor.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let stream = poll(|| acceptor.accept().unwrap());
        let mut server = TcpTransport::from_stream(stream).unwrap();
        assert!(server.connected());

        client.write_all(b"hello").unwrap();
        let mut buf = [0u8; 16];
        let n = poll(|| match server.read(&mut buf).unwrap() {
            0 => None,
            n => Some(n),
        });
        assert_eq!(&buf[..n], b"hello");

        assert_eq!(server.write(b"back").unwrap(), 4);
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"back");
    }

    #[test]
    fn test_peer_hangup_detaches_stream() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(acceptor.local_addr().unwrap()).unwrap();
        let stream = poll(|| acceptor.accept().unwrap());
        let mut server = TcpTransport::from_stream(stream).unwrap();
        drop(client);

        let mut buf = [0u8; 4];
        poll(|| {
            let _ = server.read(&mut buf);
            (!server.connected()).then_some(())
        });
    }
}
