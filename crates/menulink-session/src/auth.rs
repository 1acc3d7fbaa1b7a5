//! Authentication hook for validating remote identity.
//!
//! A remote proves who it is by sending its name and a UUID key in the join
//! message. The connection does not know where keys live. It asks an
//! [`Authenticator`], and this module provides three:
//!
//! - [`NoAuthentication`]: accepts everyone, for trusted links.
//! - [`ReadOnlyAuthenticator`]: a fixed list of keys, pairing refused.
//! - [`KeyStore`]: a bounded, serializable list that pairing can add to.
//!
//! # Why a trait?
//!
//! The host decides where keys are kept (flash, a file, a database). The
//! protocol core only needs the three questions below answered, so hosts
//! can plug in their own store without touching the connection code.

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Longest remote name a key slot keeps.
pub const MAX_KEY_NAME_LEN: usize = 15;

/// Longest UUID a key slot keeps.
pub const MAX_KEY_UUID_LEN: usize = 39;

/// Decides whether a remote may connect, and stores keys from pairing.
///
/// `Send` lets a registry holding the authenticator move onto the task
/// that drives the tick loop.
///
/// # Example
///
/// ```rust
/// use menulink_session::{Authenticator, SessionError};
///
/// /// Lets in anything whose key starts with a shared prefix.
/// struct PrefixAuthenticator(&'static str);
///
/// impl Authenticator for PrefixAuthenticator {
///     fn authenticate(&self, _name: &str, uuid: &str) -> bool {
///         uuid.starts_with(self.0)
///     }
///
///     fn add_key(&mut self, _name: &str, _uuid: &str) -> Result<(), SessionError> {
///         Err(SessionError::PairingDisabled)
///     }
/// }
///
/// let auth = PrefixAuthenticator("lab-");
/// assert!(auth.authenticate("bench", "lab-1234"));
/// assert!(auth.requires_authentication());
/// ```
pub trait Authenticator: Send {
    /// Whether a join without any UUID must be refused.
    fn requires_authentication(&self) -> bool {
        true
    }

    /// Checks the key a remote presented under `name`.
    fn authenticate(&self, name: &str, uuid: &str) -> bool;

    /// Stores (or replaces) the key for `name`.
    fn add_key(&mut self, name: &str, uuid: &str) -> Result<(), SessionError>;
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn requires_authentication(&self) -> bool {
        (**self).requires_authentication()
    }

    fn authenticate(&self, name: &str, uuid: &str) -> bool {
        (**self).authenticate(name, uuid)
    }

    fn add_key(&mut self, name: &str, uuid: &str) -> Result<(), SessionError> {
        (**self).add_key(name, uuid)
    }
}

// ---------------------------------------------------------------------------
// NoAuthentication
// ---------------------------------------------------------------------------

/// Accepts every remote, with or without a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthentication;

impl Authenticator for NoAuthentication {
    fn requires_authentication(&self) -> bool {
        false
    }

    fn authenticate(&self, _name: &str, _uuid: &str) -> bool {
        true
    }

    fn add_key(&mut self, _name: &str, _uuid: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Key entries
// ---------------------------------------------------------------------------

/// A remote name and the key it authenticates with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub name: String,
    pub uuid: String,
}

impl KeyEntry {
    /// Builds an entry, clipping both parts to their slot sizes.
    pub fn new(name: &str, uuid: &str) -> Self {
        Self {
            name: clip(name, MAX_KEY_NAME_LEN),
            uuid: clip(uuid, MAX_KEY_UUID_LEN),
        }
    }

    fn matches(&self, name: &str, uuid: &str) -> bool {
        self.name == clip(name, MAX_KEY_NAME_LEN) && self.uuid == clip(uuid, MAX_KEY_UUID_LEN)
    }
}

/// Truncates to at most `max` bytes on a character boundary.
fn clip(s: &str, max: usize) -> String {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ---------------------------------------------------------------------------
// ReadOnlyAuthenticator
// ---------------------------------------------------------------------------

/// A fixed set of keys, typically compiled into the firmware.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyAuthenticator {
    entries: Vec<KeyEntry>,
}

impl ReadOnlyAuthenticator {
    pub fn new(entries: impl IntoIterator<Item = KeyEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl Authenticator for ReadOnlyAuthenticator {
    fn authenticate(&self, name: &str, uuid: &str) -> bool {
        self.entries.iter().any(|e| e.matches(name, uuid))
    }

    fn add_key(&mut self, name: &str, _uuid: &str) -> Result<(), SessionError> {
        tracing::warn!(name, "pairing refused by read-only authenticator");
        Err(SessionError::PairingDisabled)
    }
}

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

/// A bounded, mutable key list.
///
/// One slot per remote name: pairing again under the same name replaces
/// that slot's key. The store serializes with serde, so hosts can persist
/// it wherever they like and reload it on start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStore {
    capacity: usize,
    entries: Vec<KeyEntry>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl KeyStore {
    /// Slot count when none is given.
    pub const DEFAULT_CAPACITY: usize = 6;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Name stored in slot `index`, if the slot is used.
    pub fn key_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// Empties every slot.
    pub fn reset(&mut self) {
        tracing::info!(cleared = self.entries.len(), "key store reset");
        self.entries.clear();
    }
}

impl Authenticator for KeyStore {
    fn authenticate(&self, name: &str, uuid: &str) -> bool {
        let ok = self.entries.iter().any(|e| e.matches(name, uuid));
        if !ok {
            tracing::debug!(name, "no matching key");
        }
        ok
    }

    fn add_key(&mut self, name: &str, uuid: &str) -> Result<(), SessionError> {
        let entry = KeyEntry::new(name, uuid);
        if let Some(slot) = self.entries.iter_mut().find(|e| e.name == entry.name) {
            *slot = entry;
        } else if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            tracing::warn!(name, capacity = self.capacity, "no free key slot");
            return Err(SessionError::KeyStoreFull {
                capacity: self.capacity,
            });
        }
        tracing::info!(name, "key stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_authentication_accepts_all() {
        let mut auth = NoAuthentication;
        assert!(!auth.requires_authentication());
        assert!(auth.authenticate("x", "y"));
        assert!(auth.add_key("x", "y").is_ok());
    }

    #[test]
    fn test_read_only_checks_name_and_key() {
        let mut auth = ReadOnlyAuthenticator::new([KeyEntry::new("tablet", "uuid-1")]);
        assert!(auth.authenticate("tablet", "uuid-1"));
        assert!(!auth.authenticate("tablet", "uuid-2"));
        assert!(!auth.authenticate("phone", "uuid-1"));
        assert!(matches!(
            auth.add_key("phone", "uuid-3"),
            Err(SessionError::PairingDisabled)
        ));
    }

    #[test]
    fn test_key_store_add_and_replace() {
        let mut store = KeyStore::new(2);
        store.add_key("a", "1").unwrap();
        store.add_key("b", "2").unwrap();
        assert!(store.authenticate("a", "1"));

        // Same name reuses the slot.
        store.add_key("a", "9").unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.authenticate("a", "1"));
        assert!(store.authenticate("a", "9"));
        assert_eq!(store.key_name(1), Some("b"));
    }

    #[test]
    fn test_key_store_full() {
        let mut store = KeyStore::new(1);
        store.add_key("a", "1").unwrap();
        assert!(matches!(
            store.add_key("b", "2"),
            Err(SessionError::KeyStoreFull { capacity: 1 })
        ));
        assert!(!store.authenticate("b", "2"));
    }

    #[test]
    fn test_long_names_are_clipped_consistently() {
        let mut store = KeyStore::default();
        assert_eq!(store.capacity(), 6);
        let long_name = "a-remote-with-a-very-long-name";
        store.add_key(long_name, "k").unwrap();
        assert_eq!(store.key_name(0), Some("a-remote-with-a"));
        assert!(store.authenticate(long_name, "k"));
    }

    #[test]
    fn test_key_store_serde_round_trip() {
        let mut store = KeyStore::new(3);
        store.add_key("tablet", "07cd8bc6").unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let back: KeyStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
        assert!(back.authenticate("tablet", "07cd8bc6"));
    }

    #[test]
    fn test_reset_clears() {
        let mut store = KeyStore::default();
        store.add_key("a", "1").unwrap();
        store.reset();
        assert!(store.is_empty());
    }
}
