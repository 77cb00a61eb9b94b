//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：ReAct 循环根据 AgentError 决定 RetryWithPrompt / Abort。

use thiserror::Error;

/// 推理 Agent 运行过程中可能出现的错误（LLM、解析、工具、步数上限等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Max agent steps exceeded ({0})")]
    MaxStepsExceeded(usize),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误、调用了不存在的工具）
    RetryWithPrompt(String),
    /// 终止本次 Agent 调用，错误交给节点处理
    Abort,
}
