//! Error types for the session layer.

/// Errors that can occur while authenticating or pairing a remote.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The remote's key was missing or did not match the stored one.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Every key slot is taken by another remote name.
    #[error("key store is full ({capacity} entries)")]
    KeyStoreFull { capacity: usize },

    /// This authenticator does not accept new keys.
    #[error("pairing is not enabled")]
    PairingDisabled,
}
