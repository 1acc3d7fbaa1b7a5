//! `RemoteServer` builder and tick loop.
//!
//! The server is the async shell around a [`ConnectionRegistry`]: it owns
//! the listening sockets, wakes up every tick and runs one pass over every
//! connection while holding the menu lock.

use std::net::SocketAddr;
use std::sync::Arc;

use menulink_menu::{DialogController, MenuTree};
use menulink_session::Authenticator;
use menulink_tick::{TickConfig, TickMetrics, TickScheduler};
use menulink_transport::{TcpAcceptor, TcpTransport};
#[cfg(feature = "websocket")]
use menulink_transport::{WebSocketConfig, WebSocketTransport};
use tokio::sync::{Mutex, watch};

use crate::event::{CommsEvent, CommsListener};
#[cfg(feature = "websocket")]
use crate::init::WebSocketInitialisation;
use crate::init::TcpInitialisation;
use crate::{ConnectionRegistry, RegistryConfig, RemoteError};

/// A socket the server listens on, with the number of connection slots
/// that serve it.
#[derive(Debug, Clone)]
enum Listener {
    Tcp {
        addr: String,
        connections: usize,
    },
    #[cfg(feature = "websocket")]
    WebSocket {
        addr: String,
        connections: usize,
        config: WebSocketConfig,
    },
}

/// Builder for configuring and starting a menu server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use menulink::prelude::*;
/// use menulink::menu::sample;
///
/// # async fn serve() -> Result<(), RemoteError> {
/// let menu = Arc::new(tokio::sync::Mutex::new(sample::amplifier_menu()));
/// let server = RemoteServer::builder()
///     .listen_tcp("0.0.0.0:3333", 2)
///     .build(menu)?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteServerBuilder {
    config: RegistryConfig,
    tick: TickConfig,
    auth: Option<Box<dyn Authenticator>>,
    dialog: Option<Box<dyn DialogController>>,
    listener: Option<CommsListener>,
    listeners: Vec<Listener>,
}

impl RemoteServerBuilder {
    /// Creates a new builder with default settings and no listeners.
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            tick: TickConfig::default(),
            auth: None,
            dialog: None,
            listener: None,
            listeners: Vec::new(),
        }
    }

    /// Sets the registry configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tick cadence.
    pub fn tick_config(mut self, tick: TickConfig) -> Self {
        self.tick = tick;
        self
    }

    /// Requires remotes to present a key this authenticator knows.
    pub fn authenticator(mut self, auth: impl Authenticator + 'static) -> Self {
        self.auth = Some(Box::new(auth));
        self
    }

    /// Lets remotes press buttons on the host's dialog.
    pub fn dialog(mut self, dialog: impl DialogController + 'static) -> Self {
        self.dialog = Some(Box::new(dialog));
        self
    }

    pub fn on_comms_event(mut self, listener: impl Fn(&CommsEvent) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Serves plain TCP on `addr` with `connections` slots.
    pub fn listen_tcp(mut self, addr: &str, connections: usize) -> Self {
        self.listeners.push(Listener::Tcp {
            addr: addr.to_string(),
            connections,
        });
        self
    }

    /// Serves WebSocket clients on `addr` with `connections` slots.
    #[cfg(feature = "websocket")]
    pub fn listen_websocket(mut self, addr: &str, connections: usize, config: WebSocketConfig) -> Self {
        self.listeners.push(Listener::WebSocket {
            addr: addr.to_string(),
            connections,
            config,
        });
        self
    }

    /// Binds every listener and registers its connection slots.
    ///
    /// Fails if a socket cannot be bound or if the listeners ask for more
    /// slots than the registry capacity.
    pub fn build<M>(self, menu: Arc<Mutex<M>>) -> Result<RemoteServer, RemoteError>
    where
        M: MenuTree + 'static,
    {
        let mut config = self.config;
        config.connection.tick_interval = self.tick.interval;
        let mut registry = ConnectionRegistry::new(config);
        if let Some(auth) = self.auth {
            registry.set_boxed_authenticator(auth);
        }
        if let Some(dialog) = self.dialog {
            registry.set_boxed_dialog(dialog);
        }
        if let Some(listener) = self.listener {
            registry.set_listener(listener);
        }

        let mut local_addrs = Vec::with_capacity(self.listeners.len());
        for listener in self.listeners {
            match listener {
                Listener::Tcp { addr, connections } => {
                    let acceptor = Arc::new(TcpAcceptor::bind(addr.as_str())?);
                    local_addrs.push(acceptor.local_addr()?);
                    for _ in 0..connections {
                        let init = TcpInitialisation::shared(Arc::clone(&acceptor))?;
                        registry.add_connection(TcpTransport::new(), init)?;
                    }
                }
                #[cfg(feature = "websocket")]
                Listener::WebSocket {
                    addr,
                    connections,
                    config,
                } => {
                    let acceptor = Arc::new(TcpAcceptor::bind(addr.as_str())?);
                    local_addrs.push(acceptor.local_addr()?);
                    for _ in 0..connections {
                        let init = WebSocketInitialisation::shared(Arc::clone(&acceptor))?;
                        let transport = WebSocketTransport::with_config(TcpTransport::new(), config.clone());
                        registry.add_connection(transport, init)?;
                    }
                }
            }
        }

        let (shutdown, _) = watch::channel(false);
        Ok(RemoteServer {
            registry,
            menu: menu as SharedMenu,
            scheduler: TickScheduler::new(self.tick),
            local_addrs,
            shutdown: Arc::new(shutdown),
        })
    }
}

impl Default for RemoteServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a running [`RemoteServer`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks the server to say goodbye to every remote and return from
    /// [`run`](RemoteServer::run).
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

type SharedMenu = Arc<Mutex<dyn MenuTree>>;

/// A menu server ready to run.
///
/// Call [`run()`](Self::run) to start ticking.
pub struct RemoteServer {
    registry: ConnectionRegistry,
    menu: SharedMenu,
    scheduler: TickScheduler,
    local_addrs: Vec<SocketAddr>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RemoteServer {
    /// Creates a new builder.
    pub fn builder() -> RemoteServerBuilder {
        RemoteServerBuilder::new()
    }

    /// Bound addresses, in the order the listeners were added.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// For registering connections the builder has no shortcut for, such
    /// as a serial line.
    pub fn registry_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Runs the tick loop until [`ShutdownHandle::shutdown`] is called,
    /// then returns the scheduler's totals.
    ///
    /// Each tick locks the menu, advances every connection once and
    /// releases the lock, so the application can change values between
    /// ticks and they go out on the next one.
    pub async fn run(mut self) -> Result<TickMetrics, RemoteError> {
        let mut shutdown = self.shutdown.subscribe();
        tracing::info!(
            connections = self.registry.len(),
            addrs = ?self.local_addrs,
            interval = ?self.scheduler.interval(),
            "menu server running"
        );

        while !*shutdown.borrow_and_update() {
            let tick = tokio::select! {
                _ = shutdown.changed() => None,
                info = self.scheduler.wait_for_tick() => Some(info),
            };
            let Some(info) = tick else {
                continue;
            };
            tracing::trace!(tick = info.tick, "tick");
            {
                let mut menu = self.menu.lock().await;
                self.registry.tick_all(&mut *menu);
            }
            self.scheduler.record_tick_end();
        }

        let metrics = self.scheduler.metrics().clone();
        tracing::info!(
            ticks = metrics.total_ticks,
            overruns = metrics.total_overruns,
            skipped = metrics.total_skipped,
            max_tick_time = ?metrics.max_tick_time,
            "menu server shutting down"
        );
        self.registry.disconnect_all();
        Ok(metrics)
    }
}
