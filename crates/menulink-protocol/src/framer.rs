//! [`ByteFramer`]: the codec bolted onto a [`Transport`].

use menulink_transport::Transport;

use crate::codec::{encode_end, encode_field, encode_start};
use crate::{FieldParser, ParsedField, ProtocolError, Tag};

/// Bytes pulled from the transport per read.
const READ_CHUNK: usize = 64;

/// Reads [`ParsedField`]s from, and writes tag-value messages to, one
/// transport.
///
/// Reading never blocks: [`next_field`](Self::next_field) returns `None`
/// as soon as the transport has nothing more to give, and picks up the
/// partial message on the next call.
///
/// Writing is buffered. `start_message` / `write_field` / `end_message`
/// only append to an internal buffer; [`flush`](Self::flush) hands it to
/// the transport and keeps whatever the transport did not accept.
#[derive(Debug)]
pub struct ByteFramer<T> {
    transport: T,
    parser: FieldParser,
    read_buf: [u8; READ_CHUNK],
    read_pos: usize,
    read_len: usize,
    out: Vec<u8>,
}

impl<T: Transport> ByteFramer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            parser: FieldParser::new(),
            read_buf: [0; READ_CHUNK],
            read_pos: 0,
            read_len: 0,
            out: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// Returns the next complete unit, or `None` when more bytes are needed.
    pub fn next_field(&mut self) -> Option<ParsedField> {
        loop {
            if self.read_pos == self.read_len {
                self.read_pos = 0;
                self.read_len = match self.transport.read(&mut self.read_buf) {
                    Ok(n) => n,
                    Err(error) => {
                        tracing::debug!(%error, "read failed");
                        0
                    }
                };
                if self.read_len == 0 {
                    return None;
                }
            }
            let byte = self.read_buf[self.read_pos];
            self.read_pos += 1;
            if let Some(field) = self.parser.push(byte) {
                return Some(field);
            }
        }
    }

    /// Begins an outgoing message.
    pub fn start_message(&mut self, message_type: impl Into<Tag>) {
        encode_start(&mut self.out, message_type.into());
    }

    pub fn write_field(&mut self, field: Tag, value: &str) {
        encode_field(&mut self.out, field, value.as_bytes());
    }

    pub fn write_field_int(&mut self, field: Tag, value: i64) {
        encode_field(&mut self.out, field, value.to_string().as_bytes());
    }

    pub fn end_message(&mut self) {
        encode_end(&mut self.out);
    }

    /// Bytes encoded but not yet accepted by the transport.
    pub fn pending_output(&self) -> usize {
        self.out.len()
    }

    /// Pushes buffered output to the transport.
    ///
    /// Safe to call at any time, including with nothing buffered. If the
    /// transport takes only part of the buffer the rest is kept for the
    /// next flush. A disconnected transport discards the buffer.
    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        while !self.out.is_empty() {
            match self.transport.write(&self.out) {
                Ok(0) => break,
                Ok(n) => {
                    self.out.drain(..n);
                }
                Err(e) => {
                    self.out.clear();
                    return Err(e.into());
                }
            }
        }
        self.transport.flush()?;
        Ok(())
    }

    /// Forgets partial input and unsent output. Used when the peer changes.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.read_pos = 0;
        self.read_len = 0;
        self.out.clear();
    }

    /// Closes the transport and resets the framer.
    pub fn close(&mut self) {
        self.transport.close();
        self.reset();
    }
}
