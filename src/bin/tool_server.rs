//! NutriLens 工具网关：对外提供 nutrition_fetch / wiki_search
//!
//! 启动: cargo run --bin nutrilens-tools --features web
//! 客户端配置 tools.gateway_url = "http://<host>:<tool_port>/mcp"

use std::sync::Arc;

use anyhow::Context;

use nutrilens::config::{load_config, AppConfig, Secrets};
use nutrilens::core::{build_tool_registry, ShutdownManager};
use nutrilens::server::tool_router;
use nutrilens::tools::ToolExecutor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nutrilens::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let addr = cfg.server.tool_addr();
    let registry = build_tool_registry(&cfg, &Secrets::from_env());
    let executor = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let token = shutdown.token();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(tools = ?executor.tool_names(), "Tool gateway listening on http://{}", addr);
    axum::serve(listener, tool_router(executor))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("server error")?;
    Ok(())
}
