//! Terminal listener client
//!
//! Connects to the gateway's listener endpoint and prints relayed answers to
//! the terminal. The connection is kept alive with periodic pings and
//! re-established on a fixed delay after any failure, so the listener
//! reclaims the delivery slot without operator intervention.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::{Error, Result};

/// Fixed delay between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Heartbeat interval keeping idle connections open through proxies
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Reconnecting listener client
pub struct ListenerBridge {
    url: String,
}

impl ListenerBridge {
    /// Create a bridge for an explicit WebSocket URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Create a bridge for a gateway on the local host
    #[must_use]
    pub fn local(port: u16) -> Self {
        Self::new(format!("ws://127.0.0.1:{port}/ws/listener"))
    }

    /// Run until cancelled, reconnecting after every closed or failed session
    pub async fn run(&self) {
        loop {
            match self.session().await {
                Ok(()) => tracing::info!("listener connection closed"),
                Err(e) => tracing::warn!(error = %e, "listener connection failed"),
            }
            tracing::info!(delay_secs = RECONNECT_DELAY.as_secs(), "reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// One connection lifetime: print every relayed answer until the socket
    /// closes
    async fn session(&self) -> Result<()> {
        let (stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| Error::Session(format!("connect {}: {e}", self.url)))?;
        tracing::info!(url = %self.url, "listener connected");

        let (mut write, mut read) = stream.split();
        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + PING_INTERVAL,
            PING_INTERVAL,
        );

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    write
                        .send(Message::Text("ping".to_string()))
                        .await
                        .map_err(|e| Error::Session(format!("ping failed: {e}")))?;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text != "pong" {
                            println!("{text}\n");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(Error::Session(format!("listener stream error: {e}")));
                    }
                },
            }
        }
    }
}
