//! # menulink
//!
//! Remote control of an embedded device's menu over a small tag-value
//! protocol.
//!
//! A *host* owns a tree of menu items (volumes, switches, text fields,
//! actions). Any number of *remotes*, up to the registry capacity, connect
//! over serial, TCP or WebSocket, join with a name and key, receive the
//! whole tree in one bootstrap, and from then on see every value change as
//! it happens and can send changes of their own.
//!
//! ## Layers
//!
//! ```text
//! RemoteServer         ← async tick loop, listening sockets
//!     ↕
//! ConnectionRegistry   ← slots, init strategies, shared menu
//!     ↕
//! ProtocolConnection   ← per-remote state machine (this crate)
//!     ↕
//! menulink-protocol    ← tag-value framing
//!     ↕
//! menulink-transport   ← non-blocking byte pipes
//! ```
//!
//! Nothing below the server is async: every layer is advanced by a tick,
//! 20 ms apart by default, and no tick ever waits on I/O.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use menulink::prelude::*;
//! use menulink::menu::sample;
//!
//! # async fn serve() -> Result<(), RemoteError> {
//! let menu = Arc::new(tokio::sync::Mutex::new(sample::amplifier_menu()));
//! let server = RemoteServer::builder()
//!     .listen_tcp("0.0.0.0:3333", 2)
//!     .listen_websocket("0.0.0.0:3334", 1, WebSocketConfig::default())
//!     .build(Arc::clone(&menu))?;
//! let metrics = server.run().await?;
//! println!("served {} ticks", metrics.total_ticks);
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod dispatch;
mod error;
mod event;
mod init;
mod registry;
mod server;

pub use config::RegistryConfig;
pub use connection::{BOOT_END, BOOT_START, HostContext, ProtocolConnection};
pub use dispatch::{JoinRequest, MessageDispatchTable, ProtocolMessageContext, ValueChangeRequest};
pub use error::RemoteError;
pub use event::{CommsEvent, CommsEventKind, CommsListener};
#[cfg(feature = "websocket")]
pub use init::{DEFAULT_HANDSHAKE_TIMEOUT, WebSocketInitialisation};
pub use init::{AlwaysReady, InitStrategy, MemoryInitialisation, TcpInitialisation};
pub use registry::ConnectionRegistry;
pub use server::{RemoteServer, RemoteServerBuilder, ShutdownHandle};

pub use menulink_menu as menu;
pub use menulink_protocol as protocol;
pub use menulink_session as session;
pub use menulink_tick as tick;
pub use menulink_transport as transport;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use menulink::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AlwaysReady, CommsEvent, CommsEventKind, ConnectionRegistry, InitStrategy, RegistryConfig,
        RemoteError, RemoteServer, RemoteServerBuilder, ShutdownHandle, TcpInitialisation,
    };

    pub use menulink_menu::{
        BooleanNaming, ButtonType, DialogController, ItemData, ItemId, MenuItem, MenuStore, MenuTree,
    };
    pub use menulink_protocol::AckStatus;
    pub use menulink_session::{
        Authenticator, ConnectionConfig, KeyEntry, KeyStore, LocalInfo, NoAuthentication, Platform,
        ReadOnlyAuthenticator,
    };
    pub use menulink_tick::{TickConfig, TickMetrics, TickPolicy};
    pub use menulink_transport::{MemoryTransport, TcpTransport, Transport};

    #[cfg(feature = "websocket")]
    pub use crate::WebSocketInitialisation;
    #[cfg(feature = "websocket")]
    pub use menulink_transport::{WebSocketConfig, WebSocketTransport};
}
