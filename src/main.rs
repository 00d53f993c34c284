//! CLI for livethread
//!
//! Subcommands:
//! - `server`: run the WebSocket broadcast server
//! - `client`: connect as a subscriber, join an entity topic and print every
//!   event received (useful for smoke tests)

use clap::Parser;
use livethread::client::{Memberships, Reconciler, SocketManager};
use livethread::config::load_config;
use livethread::emitter::EventEmitter;
use livethread::registry::Registry;
use livethread::transport::{JwtVerifier, start_websocket_server};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "livethread")]
enum Command {
    /// Start the WebSocket broadcast server
    Server,
    /// Connect to a server, join an entity topic and print incoming events
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Bearer token identifying the subject
        #[arg(long)]
        token: String,
        /// Entity id whose topic to join
        #[arg(long, default_value = "demo")]
        entity: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    livethread::utils::logging::init("info");

    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client { url, token, entity } => {
            if let Err(e) = run_client(&url, token, &entity).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Registry and emitter are built once here and passed by reference;
    // the embedding CRUD layer receives the emitter the same way.
    let registry = Arc::new(Mutex::new(Registry::new()));
    let emitter = EventEmitter::new(registry.clone());
    let verifier = Arc::new(JwtVerifier::new(config.server.jwt_secret.clone()));

    tokio::select! {
        _ = start_websocket_server(addr, registry, emitter, verifier) => {
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    url: &str,
    token: String,
    entity: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let socket = SocketManager::new(url, Some(token), config.realtime.retry_policy(), events_tx);
    socket.connect()?;

    let memberships = Memberships::new(
        socket.clone(),
        config.realtime.typing_debounce(),
        config.realtime.typing_idle(),
    );
    // The join is queued once the socket is up; re-issued joins are
    // idempotent server-side.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    memberships.join(entity);

    let mut reconciler = Reconciler::new("smoke-test");
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                println!("{}", serde_json::to_string(&event)?);
                reconciler.apply(event);
            }
            _ = tokio::signal::ctrl_c() => {
                memberships.teardown();
                socket.disconnect();
                break;
            }
        }
    }

    Ok(())
}
