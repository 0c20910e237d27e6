//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables.

use gateway_client::{ClientEvent, GatewayClient};
use gateway_common::{try_init_tracing, ClientConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting gateway client...");

    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        url = %config.gateway.url,
        token = %config.auth.token,
        "Configuration loaded"
    );

    let client = GatewayClient::new(config)?;
    let mut events = client.subscribe();
    let handle = client.start()?;

    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            client.shutdown();
        }
        () = wait_stopped(&client) => {}
    }

    handle.await?;
    logger.abort();

    info!("Gateway client exited");
    Ok(())
}

async fn wait_stopped(client: &GatewayClient) {
    let mut tick = tokio::time::interval(std::time::Duration::from_millis(500));
    while client.is_running() {
        tick.tick().await;
    }
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Dispatch { sequence, event } => {
            info!(?sequence, event = %event.event_type(), "Dispatch");
        }
        ClientEvent::HandlerFailed { label, error, .. } => {
            warn!(%label, %error, "Handler failed");
        }
        other => info!(event = ?other, "Client event"),
    }
}
