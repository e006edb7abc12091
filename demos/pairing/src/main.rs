//! Starts a Matchgate server, connects two clients, and prints their game.
//!
//! ```text
//! RUST_LOG=debug cargo run -p pairing
//! MATCHGATE_ADDR=127.0.0.1:9000 cargo run -p pairing
//! ```

use std::time::Duration;

use matchgate::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Development tokens of the form `player-<id>`.
struct PlayerTokens;

impl Authenticator for PlayerTokens {
    async fn authenticate(&self, token: &Token) -> Result<SessionId, SessionError> {
        token
            .as_str()
            .strip_prefix("player-")
            .and_then(|id| id.parse().ok())
            .map(SessionId)
            .ok_or_else(|| SessionError::AuthFailed("expected player-<id>".into()))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

async fn play(url: String, token: &'static str) -> Result<(), MatchgateError> {
    let client = AuthenticatedConnection::new();
    client.set_open_handler(move || {
        tracing::info!(token, "connected, waiting for a match");
        Ok(())
    })?;
    client.set_message_handler(move |frame| {
        let outcome: MatchOutcome = serde_json::from_str(frame)?;
        if outcome.is_cancelled() {
            tracing::warn!(token, "no match found");
        } else {
            tracing::info!(token, game = %serde_json::Value::Object(outcome.data), "matched");
        }
        Ok(())
    })?;
    client.set_close_handler(move || {
        tracing::info!(token, "session closed");
        Ok(())
    })?;

    let end = client.connect(&url, token).await?;
    tracing::info!(token, ?end, "client done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("MATCHGATE_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let config = ServerConfig::default()
        .with_match_interval(Duration::from_millis(100))
        .with_max_wait(Duration::from_secs(10));

    let server = MatchServer::builder()
        .bind(&addr)
        .config(config)
        .build(DefaultPolicy::new(), PlayerTokens)
        .await?;
    let url = format!("ws://{}", server.local_addr()?);
    tracing::info!(%url, "pairing demo server");
    let server = tokio::spawn(server.run());

    let (a, b) = tokio::join!(
        play(url.clone(), "player-1"),
        play(url.clone(), "player-2"),
    );
    a?;
    b?;

    server.abort();
    Ok(())
}
