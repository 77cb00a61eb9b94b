//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 ReAct 循环决定是重试还是终止。
//! 工具失败不终止循环：以 Observation 形式告诉模型，由模型基于已有信息继续。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作（重试提示 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据错误类型返回建议的恢复动作；available_tools 用于提示模型可用的工具名
    pub fn handle(&self, err: &AgentError, available_tools: &[String]) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output was not valid JSON: {raw}. \
                 To call a tool, output exactly one JSON object and nothing else, \
                 formatted as {{\"tool\": \"<name>\", \"args\": {{...}}}}. \
                 To answer, output plain text without any JSON."
            )),
            AgentError::HallucinatedTool(name) => {
                let tools = if available_tools.is_empty() {
                    "none; answer from your own knowledge".to_string()
                } else {
                    available_tools.join(", ")
                };
                RecoveryAction::RetryWithPrompt(format!(
                    "Tool '{name}' does not exist. Available tools: {tools}."
                ))
            }
            AgentError::ToolExecutionFailed(msg) => RecoveryAction::RetryWithPrompt(format!(
                "Observation: the tool call failed ({msg}). Continue with the information you have."
            )),
            AgentError::ToolTimeout(name) => RecoveryAction::RetryWithPrompt(format!(
                "Observation: tool '{name}' timed out. Continue with the information you have."
            )),
            _ => RecoveryAction::Abort,
        }
    }
}
