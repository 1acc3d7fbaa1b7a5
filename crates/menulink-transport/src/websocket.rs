//! RFC 6455 server envelope over any [`Transport`].
//!
//! [`WebSocketTransport`] owns an inner transport (usually a
//! [`TcpTransport`](crate::TcpTransport)), answers the HTTP Upgrade request
//! and then exposes the binary frame payloads as a plain byte stream. It
//! never blocks: the handshake and frame parsing advance a little on every
//! call and pick up where they left off.
//!
//! ```text
//!  NotConnected ──request complete──▶ HttpRequestReceived ──101 sent──▶ Idle
//!                                                                     │  ▲
//!                                                        frame header │  │ payload done
//!                                                                     ▼  │
//!                                                                ReceivingFrame
//!  any state ──close frame / protocol error / close()──▶ Closed
//! ```

use std::collections::VecDeque;

use crate::codec::{mask_payload, upgrade_response, websocket_accept_key};
use crate::{Transport, TransportError};

/// Largest HTTP upgrade request we are willing to buffer.
const MAX_REQUEST_LEN: usize = 4096;

/// Control frame payloads are limited to 125 bytes (RFC 6455 §5.5).
const MAX_CONTROL_PAYLOAD: usize = 125;

const OPCODE_CONTINUATION: u8 = 0x0;
const OPCODE_TEXT: u8 = 0x1;
const OPCODE_BINARY: u8 = 0x2;
const OPCODE_CLOSE: u8 = 0x8;
const OPCODE_PING: u8 = 0x9;
const OPCODE_PONG: u8 = 0xA;

/// Settings for the WebSocket envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Request path the upgrade must target. Defaults to `/`.
    pub endpoint: String,
    /// Largest frame payload accepted from the client. Defaults to 256.
    pub buffer_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            endpoint: "/".to_string(),
            buffer_size: 256,
        }
    }
}

/// Where a [`WebSocketTransport`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketState {
    /// Waiting for (the rest of) the HTTP upgrade request.
    NotConnected,
    /// Request accepted, `101` response not fully written yet.
    HttpRequestReceived,
    /// Between frames.
    Idle,
    /// Part way through a frame payload.
    ReceivingFrame,
    /// The socket was closed; [`WebSocketTransport::restart`] re-arms it.
    Closed,
}

/// Header of the frame currently being received.
#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    opcode: u8,
    mask: [u8; 4],
    /// Payload bytes still to come.
    remaining: usize,
    /// Payload bytes already consumed, for the mask position.
    offset: usize,
}

/// A server-side WebSocket over an inner byte transport.
#[derive(Debug)]
pub struct WebSocketTransport<T> {
    inner: T,
    config: WebSocketConfig,
    state: WebSocketState,
    /// Upgrade request bytes collected so far.
    request: Vec<u8>,
    /// Bytes read from `inner` but not yet parsed as frames.
    raw: VecDeque<u8>,
    frame: Option<FrameHeader>,
    /// Payload written by the caller, framed on the next `flush`.
    payload_out: Vec<u8>,
    /// Encoded bytes the inner transport has not accepted yet.
    pending_out: VecDeque<u8>,
}

impl<T: Transport> WebSocketTransport<T> {
    /// Wraps `inner` with the default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WebSocketConfig::default())
    }

    /// Wraps `inner` with an explicit configuration.
    pub fn with_config(inner: T, config: WebSocketConfig) -> Self {
        Self {
            inner,
            config,
            state: WebSocketState::NotConnected,
            request: Vec::new(),
            raw: VecDeque::new(),
            frame: None,
            payload_out: Vec::new(),
            pending_out: VecDeque::new(),
        }
    }

    pub fn state(&self) -> WebSocketState {
        self.state
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Mutable access to the inner transport, e.g. to attach a new stream.
    /// Call [`restart`](Self::restart) afterwards.
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Forgets all per-connection state and waits for a fresh upgrade.
    pub fn restart(&mut self) {
        self.state = WebSocketState::NotConnected;
        self.request.clear();
        self.raw.clear();
        self.frame = None;
        self.payload_out.clear();
        self.pending_out.clear();
    }

    /// Advances the upgrade handshake without blocking.
    ///
    /// Returns `Ok(true)` once the connection carries frames, `Ok(false)`
    /// while the handshake is still in progress (or nothing is attached).
    /// A malformed request closes the inner transport and returns
    /// [`TransportError::HandshakeFailed`].
    pub fn poll_handshake(&mut self) -> Result<bool, TransportError> {
        match self.state {
            WebSocketState::Idle | WebSocketState::ReceivingFrame => return Ok(true),
            WebSocketState::Closed => return Ok(false),
            WebSocketState::NotConnected | WebSocketState::HttpRequestReceived => {}
        }
        if !self.inner.connected() {
            return Ok(false);
        }

        if self.state == WebSocketState::NotConnected {
            let mut chunk = [0u8; 256];
            loop {
                let n = self.inner.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                self.request.extend_from_slice(&chunk[..n]);
                if find_header_end(&self.request).is_some() {
                    break;
                }
            }

            let Some(end) = find_header_end(&self.request) else {
                if self.request.len() > MAX_REQUEST_LEN {
                    return Err(self.fail(TransportError::HandshakeFailed(
                        "upgrade request too long".into(),
                    )));
                }
                return Ok(false);
            };

            let key = match parse_upgrade_request(&self.request[..end], &self.config.endpoint) {
                Ok(key) => key,
                Err(reason) => return Err(self.fail(TransportError::HandshakeFailed(reason))),
            };
            // Anything after the blank line is already frame data.
            self.raw.extend(&self.request[end..]);
            self.request.clear();

            let response = upgrade_response(&websocket_accept_key(&key));
            self.pending_out.extend(response.as_bytes());
            self.state = WebSocketState::HttpRequestReceived;
            tracing::debug!(endpoint = %self.config.endpoint, "websocket upgrade accepted");
        }

        self.drain_pending()?;
        if self.pending_out.is_empty() {
            self.state = WebSocketState::Idle;
            tracing::info!("websocket connection established");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Writes as much of `pending_out` as the inner transport accepts.
    fn drain_pending(&mut self) -> Result<(), TransportError> {
        while !self.pending_out.is_empty() {
            let (front, _) = self.pending_out.as_slices();
            let n = self.inner.write(front)?;
            if n == 0 {
                break;
            }
            self.pending_out.drain(..n);
        }
        self.inner.flush()
    }

    /// Closes everything and hands the error back for returning.
    fn fail(&mut self, error: TransportError) -> TransportError {
        tracing::warn!(%error, "closing websocket");
        self.inner.close();
        self.state = WebSocketState::Closed;
        error
    }

    /// Moves whatever the inner transport has into `raw`, bounded so a
    /// flood cannot grow the buffer without limit.
    fn fill_raw(&mut self) -> Result<(), TransportError> {
        let cap = self.config.buffer_size + 14;
        let mut chunk = [0u8; 256];
        while self.raw.len() < cap {
            let want = chunk.len().min(cap - self.raw.len());
            let n = self.inner.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            self.raw.extend(&chunk[..n]);
        }
        Ok(())
    }

    /// Parses a frame header from the front of `raw` if it is complete.
    fn take_header(&mut self) -> Result<Option<FrameHeader>, TransportError> {
        if self.raw.len() < 2 {
            return Ok(None);
        }
        let b0 = self.raw[0];
        let b1 = self.raw[1];
        let opcode = b0 & 0x0F;
        if !matches!(
            opcode,
            OPCODE_CONTINUATION | OPCODE_TEXT | OPCODE_BINARY | OPCODE_CLOSE | OPCODE_PING | OPCODE_PONG
        ) {
            return Err(TransportError::UnexpectedOpcode(opcode));
        }
        if b1 & 0x80 == 0 {
            return Err(TransportError::UnmaskedFrame);
        }

        let short_len = b1 & 0x7F;
        let ext_len = match short_len {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let header_len = 2 + ext_len + 4;
        if self.raw.len() < header_len {
            return Ok(None);
        }

        let len: u64 = match ext_len {
            0 => u64::from(short_len),
            2 => u64::from(u16::from_be_bytes([self.raw[2], self.raw[3]])),
            _ => (2..10).fold(0u64, |acc, i| (acc << 8) | u64::from(self.raw[i])),
        };
        let is_control = opcode & 0x8 != 0;
        let max = if is_control {
            MAX_CONTROL_PAYLOAD
        } else {
            self.config.buffer_size
        };
        // 64-bit lengths never fit the buffer.
        if ext_len == 8 || len > max as u64 {
            return Err(TransportError::FrameTooLarge { len, max });
        }

        let m = 2 + ext_len;
        let mask = [self.raw[m], self.raw[m + 1], self.raw[m + 2], self.raw[m + 3]];
        self.raw.drain(..header_len);
        Ok(Some(FrameHeader {
            opcode,
            mask,
            remaining: len as usize,
            offset: 0,
        }))
    }

    /// Acts on a complete control frame.
    fn handle_control(&mut self, opcode: u8, payload: Vec<u8>) -> Result<(), TransportError> {
        match opcode {
            OPCODE_PING => {
                tracing::trace!(len = payload.len(), "websocket ping");
                self.pending_out.extend(encode_frame(OPCODE_PONG, &payload));
                self.drain_pending()
            }
            OPCODE_CLOSE => {
                tracing::debug!("websocket close frame received");
                self.pending_out.extend(encode_frame(OPCODE_CLOSE, &payload));
                let _ = self.drain_pending();
                self.inner.close();
                self.state = WebSocketState::Closed;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.fill_raw()?;
        let mut written = 0;
        loop {
            let mut frame = match self.frame {
                Some(frame) => frame,
                None => match self.take_header()? {
                    Some(frame) => {
                        self.state = WebSocketState::ReceivingFrame;
                        frame
                    }
                    None => break,
                },
            };

            if frame.opcode & 0x8 != 0 {
                if self.raw.len() < frame.remaining {
                    self.frame = Some(frame);
                    break;
                }
                let mut payload: Vec<u8> = self.raw.drain(..frame.remaining).collect();
                mask_payload(&mut payload, frame.mask, 0);
                self.frame = None;
                self.state = WebSocketState::Idle;
                self.handle_control(frame.opcode, payload)?;
                if self.state == WebSocketState::Closed {
                    break;
                }
                continue;
            }

            let n = frame.remaining.min(self.raw.len()).min(buf.len() - written);
            let out = &mut buf[written..written + n];
            for (slot, byte) in out.iter_mut().zip(self.raw.drain(..n)) {
                *slot = byte;
            }
            mask_payload(out, frame.mask, frame.offset);
            written += n;
            frame.remaining -= n;
            frame.offset += n;

            if frame.remaining == 0 {
                self.frame = None;
                self.state = WebSocketState::Idle;
            } else {
                // Out of input or out of room; resume on the next read.
                self.frame = Some(frame);
                break;
            }
            if written == buf.len() {
                break;
            }
        }
        Ok(written)
    }
}

impl<T: Transport> Transport for WebSocketTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.poll_handshake()? {
            return Ok(0);
        }
        match self.read_frames(buf) {
            Ok(n) => Ok(n),
            Err(e @ (TransportError::NotConnected | TransportError::Io(_))) => {
                self.state = WebSocketState::Closed;
                Err(e)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.connected() {
            return Err(TransportError::NotConnected);
        }
        self.payload_out.extend_from_slice(data);
        Ok(data.len())
    }

    /// Sends buffered payload as binary frames, then pushes whatever the
    /// inner transport will take.
    fn flush(&mut self) -> Result<(), TransportError> {
        if !self.payload_out.is_empty() {
            for chunk in self.payload_out.chunks(usize::from(u16::MAX)) {
                self.pending_out.extend(encode_frame(OPCODE_BINARY, chunk));
            }
            self.payload_out.clear();
        }
        if self.pending_out.is_empty() {
            return Ok(());
        }
        self.drain_pending()
    }

    fn connected(&self) -> bool {
        self.inner.connected()
            && matches!(
                self.state,
                WebSocketState::Idle | WebSocketState::ReceivingFrame
            )
    }

    fn close(&mut self) {
        if self.connected() {
            let frame = encode_frame(OPCODE_CLOSE, &[]);
            let _ = self.inner.write(&frame);
            let _ = self.inner.flush();
        }
        self.inner.close();
        self.state = WebSocketState::Closed;
        self.frame = None;
        self.raw.clear();
        self.payload_out.clear();
        self.pending_out.clear();
    }
}

/// Encodes one unmasked, final server frame. Payloads must be under 64 KiB.
fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(0x80 | opcode);
    if payload.len() < 126 {
        out.push(payload.len() as u8);
    } else {
        out.push(126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Offset just past the `\r\n\r\n` that ends the request head.
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Validates an upgrade request and returns its `Sec-WebSocket-Key`.
fn parse_upgrade_request(head: &[u8], endpoint: &str) -> Result<String, String> {
    let text = std::str::from_utf8(head).map_err(|_| "request is not utf-8".to_string())?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(path)) if path == endpoint => {}
        (Some("GET"), Some(path)) => return Err(format!("unknown endpoint {path}")),
        _ => return Err(format!("not a GET request: {request_line}")),
    }

    let mut upgrade = false;
    let mut key = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("upgrade") {
            upgrade = value.eq_ignore_ascii_case("websocket");
        } else if name.eq_ignore_ascii_case("sec-websocket-key") {
            key = Some(value.to_string());
        }
    }

    if !upgrade {
        return Err("missing Upgrade: websocket header".into());
    }
    key.filter(|k| !k.is_empty())
        .ok_or_else(|| "missing Sec-WebSocket-Key header".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTransport;

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    /// Builds a masked client frame.
    fn client_frame(opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        let mut out = vec![0x80 | opcode];
        if payload.len() < 126 {
            out.push(0x80 | payload.len() as u8);
        } else {
            out.push(0x80 | 126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(&mask);
        let mut body = payload.to_vec();
        mask_payload(&mut body, mask, 0);
        out.extend(body);
        out
    }

    fn upgraded() -> (WebSocketTransport<MemoryTransport>, MemoryTransport) {
        let (server, client) = MemoryTransport::pair();
        let mut ws = WebSocketTransport::new(server);
        client.clone().write(REQUEST).unwrap();
        assert!(ws.poll_handshake().unwrap());
        client.drain();
        (ws, client)
    }

    #[test]
    fn test_handshake_sends_accept_key() {
        let (server, mut client) = MemoryTransport::pair();
        let mut ws = WebSocketTransport::new(server);
        assert!(!ws.connected());

        client.write(&REQUEST[..20]).unwrap();
        assert!(!ws.poll_handshake().unwrap());
        assert_eq!(ws.state(), WebSocketState::NotConnected);

        client.write(&REQUEST[20..]).unwrap();
        assert!(ws.poll_handshake().unwrap());
        assert_eq!(ws.state(), WebSocketState::Idle);
        assert!(ws.connected());

        let response = String::from_utf8(client.drain()).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[test]
    fn test_handshake_rejects_wrong_endpoint() {
        let (server, mut client) = MemoryTransport::pair();
        let config = WebSocketConfig {
            endpoint: "/menu".into(),
            ..WebSocketConfig::default()
        };
        let mut ws = WebSocketTransport::with_config(server, config);
        client.write(REQUEST).unwrap();
        assert!(matches!(
            ws.poll_handshake(),
            Err(TransportError::HandshakeFailed(_))
        ));
        assert_eq!(ws.state(), WebSocketState::Closed);
        assert!(!client.connected());
    }

    #[test]
    fn test_handshake_rejects_missing_key() {
        let (server, mut client) = MemoryTransport::pair();
        let mut ws = WebSocketTransport::new(server);
        client
            .write(b"GET / HTTP/1.1\r\nUpgrade: websocket\r\n\r\n")
            .unwrap();
        assert!(matches!(
            ws.poll_handshake(),
            Err(TransportError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn test_reads_masked_binary_frame() {
        let (mut ws, mut client) = upgraded();
        client
            .write(&client_frame(OPCODE_BINARY, b"hello", [9, 8, 7, 6]))
            .unwrap();
        let mut buf = [0u8; 32];
        let n = ws.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(ws.state(), WebSocketState::Idle);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let (mut ws, mut client) = upgraded();
        let frame = client_frame(OPCODE_BINARY, b"abcdefgh", [1, 2, 3, 4]);
        client.write(&frame[..9]).unwrap();

        let mut buf = [0u8; 32];
        let first = ws.read(&mut buf).unwrap();
        assert_eq!(&buf[..first], b"abc");
        assert_eq!(ws.state(), WebSocketState::ReceivingFrame);

        client.write(&frame[9..]).unwrap();
        let second = ws.read(&mut buf).unwrap();
        assert_eq!(&buf[..second], b"defgh");
        assert_eq!(ws.state(), WebSocketState::Idle);
    }

    #[test]
    fn test_extended_length_frame() {
        let config = WebSocketConfig {
            buffer_size: 512,
            ..WebSocketConfig::default()
        };
        let (server, mut client) = MemoryTransport::pair();
        let mut ws = WebSocketTransport::with_config(server, config);
        client.write(REQUEST).unwrap();
        assert!(ws.poll_handshake().unwrap());

        let payload: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        client
            .write(&client_frame(OPCODE_BINARY, &payload, [0xAA, 0x55, 0x0F, 0xF0]))
            .unwrap();
        let mut got = Vec::new();
        let mut buf = [0u8; 64];
        for _ in 0..20 {
            let n = ws.read(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, payload);
    }

    #[test]
    fn test_write_then_flush_emits_one_unmasked_binary_frame() {
        let (mut ws, client) = upgraded();
        ws.write(b"ab").unwrap();
        ws.write(b"cd").unwrap();
        assert!(client.pending() == 0);
        ws.flush().unwrap();
        assert_eq!(client.drain(), [0x82, 4, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn test_large_payload_uses_16_bit_length() {
        let (mut ws, client) = upgraded();
        let payload = vec![7u8; 200];
        ws.write(&payload).unwrap();
        ws.flush().unwrap();
        let out = client.drain();
        assert_eq!(&out[..4], &[0x82, 126, 0, 200]);
        assert_eq!(&out[4..], payload.as_slice());
    }

    #[test]
    fn test_partial_inner_writes_complete_on_later_flush() {
        let (server, mut client) = MemoryTransport::pair();
        let mut ws = WebSocketTransport::new(server.with_write_limit(3));
        client.write(REQUEST).unwrap();
        while !ws.poll_handshake().unwrap() {}
        client.drain();

        ws.write(b"hello").unwrap();
        ws.flush().unwrap();
        ws.flush().unwrap();
        ws.flush().unwrap();
        assert_eq!(client.drain(), [0x82, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_ping_is_answered_with_pong() {
        let (mut ws, mut client) = upgraded();
        client
            .write(&client_frame(OPCODE_PING, b"hi", [5, 6, 7, 8]))
            .unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(ws.read(&mut buf).unwrap(), 0);
        assert_eq!(client.drain(), [0x8A, 2, b'h', b'i']);
        assert!(ws.connected());
    }

    #[test]
    fn test_close_frame_closes_socket() {
        let (mut ws, mut client) = upgraded();
        client
            .write(&client_frame(OPCODE_CLOSE, &[], [1, 1, 1, 1]))
            .unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(ws.read(&mut buf).unwrap(), 0);
        assert_eq!(ws.state(), WebSocketState::Closed);
        assert!(!ws.connected());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let (mut ws, mut client) = upgraded();
        let payload = vec![0u8; 300];
        client
            .write(&client_frame(OPCODE_BINARY, &payload, [1, 2, 3, 4]))
            .unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            ws.read(&mut buf),
            Err(TransportError::FrameTooLarge { len: 300, max: 256 })
        ));
        assert!(!ws.connected());
    }

    #[test]
    fn test_unmasked_and_unknown_frames_are_rejected() {
        let (mut ws, mut client) = upgraded();
        client.write(&[0x82, 0x01, b'x']).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(ws.read(&mut buf), Err(TransportError::UnmaskedFrame)));

        let (mut ws, mut client) = upgraded();
        client.write(&[0x83, 0x80, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            ws.read(&mut buf),
            Err(TransportError::UnexpectedOpcode(3))
        ));
        assert_eq!(ws.state(), WebSocketState::Closed);
    }

    #[test]
    fn test_64_bit_length_is_rejected() {
        let (mut ws, mut client) = upgraded();
        let mut frame = vec![0x82, 0x80 | 127];
        frame.extend_from_slice(&5u64.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0]);
        client.write(&frame).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            ws.read(&mut buf),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_restart_accepts_a_new_upgrade() {
        let (mut ws, _old_client) = upgraded();
        ws.close();
        assert_eq!(ws.state(), WebSocketState::Closed);

        let (server, mut client) = MemoryTransport::pair();
        *ws.inner_mut() = server;
        ws.restart();
        client.write(REQUEST).unwrap();
        assert!(ws.poll_handshake().unwrap());
        assert!(ws.connected());
    }
}
