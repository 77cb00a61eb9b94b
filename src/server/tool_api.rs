//! 工具网关服务：GET / 状态，GET /mcp/tools 列出工具，POST /mcp/tools/call 调用工具
//!
//! 调用经 ToolExecutor 执行，带超时与审计日志。上游 API 的错误是工具的正常输出，is_error 只表示调用本身失败。

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::tools::{ToolCallRequest, ToolCallResponse, ToolDescriptor, ToolExecutor};

#[derive(Clone)]
struct ToolApiState {
    executor: Arc<ToolExecutor>,
}

pub fn tool_router(executor: ToolExecutor) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/tools/call", post(call_tool))
        .with_state(ToolApiState {
            executor: Arc::new(executor),
        })
}

async fn status(State(state): State<ToolApiState>) -> Json<Value> {
    Json(json!({
        "name": "nutrilens-tools",
        "status": "ok",
        "tools": state.executor.tool_names(),
    }))
}

async fn list_tools(State(state): State<ToolApiState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.executor.registry().descriptors())
}

async fn call_tool(
    State(state): State<ToolApiState>,
    Json(req): Json<ToolCallRequest>,
) -> (StatusCode, Json<ToolCallResponse>) {
    match state.executor.execute(&req.name, req.arguments).await {
        Ok(content) => (StatusCode::OK, Json(ToolCallResponse::ok(content))),
        Err(AgentError::HallucinatedTool(name)) => (
            StatusCode::NOT_FOUND,
            Json(ToolCallResponse::error(format!("Unknown tool: {name}"))),
        ),
        Err(e) => (StatusCode::OK, Json(ToolCallResponse::error(e.to_string()))),
    }
}
