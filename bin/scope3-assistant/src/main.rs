//! scope3-assistant – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables and flags.
//! 2. Initialise tracing (to stderr, so the conversation owns stdout).
//! 3. Build the HTTP client and check the RAG service health.
//! 4. Wire the chat service, walkthrough and render tasks.
//! 5. Play the walkthrough, then run the prompt until `/quit` or Ctrl-C.

mod config;
mod render;
mod repl;

use std::sync::Arc;

use clap::Parser;
use scope3_chat::{ChatService, EventBus, TourController};
use scope3_client::Scope3Client;
use tracing::{info, warn};

use crate::config::{Args, HostConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = HostConfig::load(Args::parse());

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "WARN: SCOPE3_LOG='{}' is not a valid tracing filter ({}); \
                 falling back to 'info'",
                cfg.log_level, e
            );
            tracing_subscriber::EnvFilter::new("info")
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "scope3-assistant starting");

    // ── 3. HTTP collaborators ──────────────────────────────────────────────────
    let client = Arc::new(Scope3Client::new(&cfg.chat)?);
    match client.health().await {
        Ok(health) if health.is_healthy() => info!(version = ?health.version, "rag service healthy"),
        Ok(health) => warn!(status = %health.status, error = ?health.error, "rag service unhealthy"),
        Err(e) => warn!(error = %e, url = client.rag_api_url(), "rag service unreachable"),
    }

    // ── 4. Chat core ───────────────────────────────────────────────────────────
    let events = EventBus::new();
    let chat = ChatService::new(cfg.chat.clone(), client.clone(), client, events.clone());
    let tour = TourController::new(chat.clone());

    tokio::spawn(render::watch_state(chat.subscribe()));
    tokio::spawn(render::log_events(events.subscribe()));

    // ── 5. Walkthrough, then prompt ────────────────────────────────────────────
    tokio::select! {
        result = session(&cfg, &chat, &tour) => result?,
        _ = shutdown_signal() => {}
    }

    info!("scope3-assistant stopped");
    Ok(())
}

async fn session(cfg: &HostConfig, chat: &ChatService, tour: &TourController) -> anyhow::Result<()> {
    let mut input = repl::stdin_lines();
    if cfg.play_tour {
        if !repl::play_tour(tour, &mut input).await? {
            return Ok(());
        }
    } else {
        tour.skip();
    }
    repl::run(chat, tour, &mut input).await
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
