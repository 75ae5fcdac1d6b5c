//! Gateway demo binary
//!
//! Connects to the configured chat server with a small listener that
//! logs traffic and answers direct mentions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parlor::{
    serve, ChatListener, ChatMessage, Config, GatewayClient, Identifier, Identity, Person,
    Presence,
};

/// Listener that logs everything and echoes direct mentions
struct EchoListener;

#[async_trait]
impl ChatListener for EchoListener {
    async fn on_connect(&self, client: &GatewayClient) {
        info!(
            "connected as {}",
            client
                .identity()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "<unknown>".to_string())
        );
    }

    async fn on_disconnect(&self, _client: &GatewayClient) {
        info!("disconnected");
    }

    async fn on_message(&self, _client: &GatewayClient, msg: &ChatMessage) {
        info!("[{}] {}: {}", msg.room_id(), msg.sender, msg.body);
    }

    async fn on_mention(
        &self,
        client: &GatewayClient,
        msg: &ChatMessage,
        _mentions: &[Identifier],
    ) {
        // Ignore our own traffic so two bots can't ping-pong forever
        let own = client
            .identity()
            .map(|me| me.username() == msg.sender.username())
            .unwrap_or(false);
        if own || !msg.is_directed() {
            return;
        }
        client.reply(msg, "at your service").await;
    }

    async fn on_presence(&self, _client: &GatewayClient, person: &Person, status: Presence) {
        info!("{} is now {}", person, status);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=parlor=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parlor=info")),
        )
        .init();

    // Missing token is fatal here, before anything connects
    let config = Config::from_env()?;
    info!("gateway starting against {}", config.display_endpoint());

    serve(&config, Arc::new(EchoListener)).await?;

    Ok(())
}
