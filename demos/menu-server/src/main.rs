//! Serves the sample amplifier menu over TCP (port 3333) and WebSocket
//! (port 3334).
//!
//! ```text
//! RUST_LOG=menulink=debug cargo run -p menu-server
//! MENULINK_CONFIG=server.json cargo run -p menu-server
//! ```
//!
//! With `MENULINK_CONFIG` set, the file is read as a JSON
//! `RegistryConfig`. With `MENULINK_KEYS` set, remotes must present a key
//! from that JSON key store (pairing adds to it for this run only).

use std::sync::Arc;
use std::time::Duration;

use menulink::menu::sample;
use menulink::prelude::*;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<RegistryConfig, Box<dyn std::error::Error>> {
    match std::env::var("MENULINK_CONFIG") {
        Ok(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        Err(_) => Ok(RegistryConfig {
            local: LocalInfo::with_random_uuid("amp"),
            pairing_enabled: true,
            ..RegistryConfig::default()
        }),
    }
}

fn load_keys() -> Result<Option<KeyStore>, Box<dyn std::error::Error>> {
    match std::env::var("MENULINK_KEYS") {
        Ok(path) => Ok(Some(serde_json::from_str(&std::fs::read_to_string(path)?)?)),
        Err(_) => Ok(None),
    }
}

/// Drifts the heat-sink temperatures so remotes have something to watch.
async fn simulate_temperatures(menu: Arc<Mutex<MenuStore>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut step: i64 = 0;
    loop {
        interval.tick().await;
        step = (step + 1) % 40;
        let mut menu = menu.lock().await;
        for (id, base) in [(sample::LEFT_TEMP, 80), (sample::RIGHT_TEMP, 84)] {
            if let Err(error) = menu.update(id, |item| item.set_int(base + step)) {
                tracing::warn!(%error, "temperature update failed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("menulink=info,menu_server=info")),
        )
        .init();

    let config = load_config()?;
    let menu = Arc::new(Mutex::new(sample::amplifier_menu()));

    let mut builder = RemoteServer::builder()
        .config(config)
        .listen_tcp("0.0.0.0:3333", 2)
        .listen_websocket("0.0.0.0:3334", 1, WebSocketConfig::default())
        .on_comms_event(|event| tracing::info!(%event, "comms"));
    if let Some(keys) = load_keys()? {
        tracing::info!(keys = keys.len(), "authentication required");
        builder = builder.authenticator(keys);
    }
    let server = builder.build(Arc::clone(&menu))?;
    tracing::info!(addrs = ?server.local_addrs(), "serving amplifier menu");

    tokio::spawn(simulate_temperatures(Arc::clone(&menu)));

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    let metrics = server.run().await?;
    tracing::info!(ticks = metrics.total_ticks, overruns = metrics.total_overruns, "stopped");
    Ok(())
}
