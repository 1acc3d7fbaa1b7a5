//! Remote sessions for menulink.
//!
//! This crate answers two questions for every connection:
//!
//! 1. **Who is on the other end?** ([`RemoteIdentity`], [`LocalInfo`]) and
//!    may they stay? ([`Authenticator`] and its stores)
//! 2. **How far has their session got?** ([`SessionState`], with the
//!    bootstrap position in [`BootCursor`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection (menulink crate)  ← drives the session state machine
//!     ↕
//! Session Layer (this crate)   ← identity, state, keys
//!     ↕
//! Menu Layer (below)           ← provides ItemId for the bootstrap cursor
//! ```

mod auth;
mod error;
mod session;

pub use auth::{
    Authenticator, KeyEntry, KeyStore, MAX_KEY_NAME_LEN, MAX_KEY_UUID_LEN, NoAuthentication,
    ReadOnlyAuthenticator,
};
pub use error::SessionError;
pub use session::{
    BootCursor, ConnectionConfig, LocalInfo, MAX_REMOTE_NAME_LEN, Platform, RemoteIdentity,
    SessionState,
};
