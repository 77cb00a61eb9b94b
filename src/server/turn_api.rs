//! 轮次 API：POST /api/turn 提交一轮，GET /api/threads/:id 查看线程，GET /health
//!
//! 图片以 base64 传输，也接受 `data:<mime>;base64,<data>` 形式（此时可省略 mime）。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::VisionError;
use crate::workflow::{TurnInput, TurnOutput, WorkflowEngine, WorkflowError};

type ApiError = (StatusCode, String);

#[derive(Clone)]
struct TurnApiState {
    engine: Arc<WorkflowEngine>,
}

pub fn turn_router(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/turn", post(submit_turn))
        .route("/api/threads/:id", get(get_thread))
        .with_state(TurnApiState { engine })
}

#[derive(Debug, Default, Deserialize)]
pub struct TurnRequest {
    /// 缺省时创建新线程
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub user_query: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

impl TurnRequest {
    fn into_input(self) -> Result<TurnInput, ApiError> {
        let mut mime = self.mime;
        let image_bytes = match self.image_base64.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let data = match raw.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
                    Some((header, data)) => {
                        if mime.is_none() {
                            mime = header.strip_suffix(";base64").map(str::to_string);
                        }
                        data
                    }
                    None => raw,
                };
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("image_base64 is not valid base64: {e}")))?;
                Some(bytes)
            }
            None => None,
        };
        Ok(TurnInput {
            image_bytes,
            mime,
            user_query: self.user_query,
            result: self.result,
        })
    }
}

#[derive(Debug, Serialize)]
struct ThreadSummary {
    thread_id: String,
    turn: u64,
    updated_at: i64,
    food_items: Option<String>,
    result: Option<String>,
    user_result: Option<String>,
}

fn error_response(err: WorkflowError) -> ApiError {
    let status = match &err {
        WorkflowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Classifier(VisionError::InvalidImage(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Classifier(VisionError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
        WorkflowError::Classifier(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

async fn health(State(state): State<TurnApiState>) -> Json<Value> {
    let threads = state.engine.store().thread_count().await.ok();
    Json(json!({ "status": "ok", "threads": threads }))
}

async fn submit_turn(
    State(state): State<TurnApiState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnOutput>, ApiError> {
    let thread_id = req
        .thread_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let input = req.into_input()?;
    let output = state.engine.invoke(&thread_id, input).await.map_err(error_response)?;
    Ok(Json(output))
}

async fn get_thread(
    State(state): State<TurnApiState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadSummary>, ApiError> {
    let checkpoint = state
        .engine
        .checkpoint(&id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown thread: {id}")))?;
    Ok(Json(ThreadSummary {
        thread_id: checkpoint.thread_id,
        turn: checkpoint.turn,
        updated_at: checkpoint.updated_at,
        food_items: checkpoint.state.food_items,
        result: checkpoint.state.result,
        user_result: checkpoint.state.user_result,
    }))
}
