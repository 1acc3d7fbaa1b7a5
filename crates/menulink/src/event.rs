//! Connection notifications for the host application.

use std::fmt;
use std::sync::Arc;

/// What happened on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommsEventKind {
    /// A transport came up and our join was sent.
    Connected,
    /// The remote's join was accepted.
    Authenticated,
    /// The peer went away or closed the session.
    Disconnected,
    /// Nothing was heard from the peer for too long.
    Timeout,
    /// The byte stream was malformed; the connection stays up.
    ProtocolError,
    /// Output could not be written.
    WriteNotConnected,
    /// The remote's join was refused.
    AuthenticationFailed,
}

/// A notification about connection `remote_no`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommsEvent {
    pub remote_no: usize,
    pub kind: CommsEventKind,
}

impl fmt::Display for CommsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote {}: {:?}", self.remote_no, self.kind)
    }
}

/// Callback receiving every [`CommsEvent`] of a registry.
pub type CommsListener = Arc<dyn Fn(&CommsEvent) + Send + Sync>;
