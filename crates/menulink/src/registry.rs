//! [`ConnectionRegistry`]: every remote connection of one host.

use std::sync::Arc;

use menulink_menu::{DialogController, MenuTree};
use menulink_session::{Authenticator, NoAuthentication, SessionState};
use menulink_transport::Transport;

use crate::connection::{HostContext, ProtocolConnection};
use crate::event::{CommsEvent, CommsListener};
use crate::init::InitStrategy;
use crate::{RegistryConfig, RemoteError};

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A connection together with the strategy that finds its peers.
///
/// Type-erased so one registry can mix transports (a serial line, TCP
/// and WebSocket, say) while each slot keeps its concrete types.
trait Slot: Send {
    fn tick(&mut self, host: &mut HostContext<'_>);
    fn state(&self) -> SessionState;
    fn connection_status(&self) -> String;
    fn set_listener(&mut self, listener: Option<CommsListener>);
    fn disconnect(&mut self);
}

struct ConnectionSlot<T, I> {
    connection: ProtocolConnection<T>,
    init: I,
}

impl<T, I> Slot for ConnectionSlot<T, I>
where
    T: Transport,
    I: InitStrategy<T>,
{
    fn tick(&mut self, host: &mut HostContext<'_>) {
        let remote_no = self.connection.remote_no();
        if !self.init.is_initialised() {
            if let Err(error) = self.init.attempt_initialisation() {
                tracing::warn!(remote_no, %error, "initialisation failed");
            }
            return;
        }
        if !self.connection.transport().connected() && !self.connection.state().is_connected() {
            match self.init.attempt_new_connection(self.connection.transport_mut()) {
                Ok(true) => tracing::debug!(remote_no, "new peer attached"),
                Ok(false) => return,
                Err(error) => {
                    tracing::warn!(remote_no, %error, "connection attempt failed");
                    return;
                }
            }
        }
        self.connection.tick(host);
    }

    fn state(&self) -> SessionState {
        self.connection.state()
    }

    fn connection_status(&self) -> String {
        self.connection.connection_status()
    }

    fn set_listener(&mut self, listener: Option<CommsListener>) {
        self.connection.set_listener(listener);
    }

    fn disconnect(&mut self) {
        self.connection.disconnect();
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// A fixed-capacity set of remote connections sharing one menu tree.
///
/// Connection `n` owns bit `n` of every item's send-needed set, so the
/// registry never holds more than [`MAX_REMOTES`](menulink_menu::MAX_REMOTES)
/// connections.
///
/// ```rust
/// use menulink::{AlwaysReady, ConnectionRegistry, RegistryConfig};
/// use menulink::menu::sample;
/// use menulink::transport::MemoryTransport;
///
/// let mut registry = ConnectionRegistry::new(RegistryConfig::default());
/// let (host_end, _remote_end) = MemoryTransport::pair();
/// let remote_no = registry.add_connection(host_end, AlwaysReady).unwrap();
///
/// let mut menu = sample::amplifier_menu();
/// registry.tick_all(&mut menu);
/// assert!(registry.state(remote_no).unwrap().is_connected());
/// ```
pub struct ConnectionRegistry {
    config: RegistryConfig,
    slots: Vec<Box<dyn Slot>>,
    auth: Box<dyn Authenticator>,
    dialog: Option<Box<dyn DialogController>>,
    listener: Option<CommsListener>,
}

impl ConnectionRegistry {
    /// Creates an empty registry that accepts every remote. Use
    /// [`set_authenticator`](Self::set_authenticator) to require keys.
    pub fn new(config: RegistryConfig) -> Self {
        let config = config.validated();
        Self {
            slots: Vec::with_capacity(config.capacity),
            config,
            auth: Box::new(NoAuthentication),
            dialog: None,
            listener: None,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn set_authenticator(&mut self, auth: impl Authenticator + 'static) {
        self.auth = Box::new(auth);
    }

    pub(crate) fn set_boxed_authenticator(&mut self, auth: Box<dyn Authenticator>) {
        self.auth = auth;
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.auth.as_ref()
    }

    pub fn set_dialog(&mut self, dialog: impl DialogController + 'static) {
        self.dialog = Some(Box::new(dialog));
    }

    pub(crate) fn set_boxed_dialog(&mut self, dialog: Box<dyn DialogController>) {
        self.dialog = Some(dialog);
    }

    /// Delivers every connection's [`CommsEvent`]s to `listener`.
    pub fn on_comms_event(&mut self, listener: impl Fn(&CommsEvent) + Send + Sync + 'static) {
        self.set_listener(Arc::new(listener));
    }

    pub(crate) fn set_listener(&mut self, listener: CommsListener) {
        for slot in &mut self.slots {
            slot.set_listener(Some(Arc::clone(&listener)));
        }
        self.listener = Some(listener);
    }

    /// Registers a transport and the strategy that connects it. Returns the
    /// new connection's remote number.
    ///
    /// Fails with [`RemoteError::CapacityExceeded`] when every slot is
    /// taken; the existing connections are untouched.
    pub fn add_connection<T, I>(&mut self, transport: T, init: I) -> Result<usize, RemoteError>
    where
        T: Transport + 'static,
        I: InitStrategy<T> + 'static,
    {
        if self.slots.len() >= self.config.capacity {
            return Err(RemoteError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }
        let remote_no = self.slots.len();
        let mut connection = ProtocolConnection::new(
            remote_no,
            transport,
            self.config.local.clone(),
            self.config.connection.clone(),
        )
        .with_pairing(self.config.pairing_enabled);
        connection.set_listener(self.listener.clone());
        self.slots.push(Box::new(ConnectionSlot { connection, init }));
        tracing::info!(remote_no, capacity = self.config.capacity, "connection registered");
        Ok(remote_no)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn state(&self, remote_no: usize) -> Option<SessionState> {
        self.slots.get(remote_no).map(|slot| slot.state())
    }

    /// Status text of one connection; see
    /// [`ProtocolConnection::connection_status`].
    pub fn connection_status(&self, remote_no: usize) -> Option<String> {
        self.slots.get(remote_no).map(|slot| slot.connection_status())
    }

    /// Connections that have completed a join.
    pub fn authenticated_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state().is_authenticated())
            .count()
    }

    /// Runs one tick of every connection, in registration order.
    pub fn tick_all(&mut self, menu: &mut dyn MenuTree) {
        let dialog = match &mut self.dialog {
            Some(dialog) => Some(&mut **dialog as &mut dyn DialogController),
            None => None,
        };
        let mut host = HostContext {
            menu,
            auth: &mut *self.auth,
            dialog,
        };
        for slot in &mut self.slots {
            slot.tick(&mut host);
        }
    }

    /// Ends every session, telling each remote first.
    pub fn disconnect_all(&mut self) {
        for slot in &mut self.slots {
            slot.disconnect();
        }
    }
}
