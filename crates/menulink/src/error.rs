//! Unified error type for menulink.

use menulink_menu::MenuError;
use menulink_protocol::ProtocolError;
use menulink_session::SessionError;
use menulink_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so code using
/// the `menulink` crate only has to deal with this one type.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Menu(#[from] MenuError),

    /// Every connection slot of the registry is taken.
    #[error("connection registry is full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },
}
