//! NutriLens 轮次 API
//!
//! 启动: cargo run --bin nutrilens-web --features web

use std::sync::Arc;

use anyhow::Context;

use nutrilens::config::{load_config, AppConfig, Secrets};
use nutrilens::core::{EngineBuilder, ShutdownManager};
use nutrilens::server::turn_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nutrilens::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let addr = cfg.server.turn_addr();
    let engine = Arc::new(EngineBuilder::new(cfg, Secrets::from_env()).build());

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let token = shutdown.token();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Turn API listening on http://{}", addr);
    axum::serve(listener, turn_router(engine))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("server error")?;
    Ok(())
}
