//! Planner：调用 LLM 与 Tool Call 解析
//!
//! 调用 LLM 得到回复或 JSON Tool Call；parse_llm_output 从文本中提取 JSON 并解析为 ToolCall 或直接回复。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "nutrition_fetch", "args": {"query": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Planner 输出
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 最终回复
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出
///
/// - ```json 代码块或以 `{` 开头的输出视为工具调用，JSON 无效时返回 JsonParseError；
/// - 正文中间夹带的花括号只在能解析出非空 tool 时才视为工具调用，否则按普通回复处理。
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    let (json_str, strict) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
        (block, true)
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start > end {
            return Ok(PlannerOutput::Response(trimmed.to_string()));
        }
        (&trimmed[start..=end], start == 0)
    } else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    match serde_json::from_str::<ToolCall>(json_str) {
        Ok(parsed) if !parsed.tool.is_empty() => Ok(PlannerOutput::ToolCall(parsed)),
        Ok(_) => Ok(PlannerOutput::Response(trimmed.to_string())),
        Err(e) if strict => Err(AgentError::JsonParseError(format!("{}: {}", e, json_str))),
        Err(_) => Ok(PlannerOutput::Response(trimmed.to_string())),
    }
}

/// Planner：持有 LLM，负责拼 system + messages 后调用 LLM
pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan_with_system(
        &self,
        messages: &[Message],
        system: &str,
    ) -> Result<String, AgentError> {
        let mut full_messages = vec![Message::system(system.to_string())];
        full_messages.extend(messages.to_vec());
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::LlmError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_response() {
        match parse_llm_output("- Banana: 105 kcal\nTotal: 105 kcal").unwrap() {
            PlannerOutput::Response(text) => assert!(text.starts_with("- Banana")),
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_parse_tool_call() {
        let out = parse_llm_output(r#"{"tool": "nutrition_fetch", "args": {"query": "2 bananas"}}"#).unwrap();
        match out {
            PlannerOutput::ToolCall(tc) => {
                assert_eq!(tc.tool, "nutrition_fetch");
                assert_eq!(tc.args["query"], "2 bananas");
            }
            _ => panic!("Expected ToolCall"),
        }
    }

    #[test]
    fn test_parse_fenced_tool_call() {
        let out = parse_llm_output("```json\n{\"tool\": \"wiki_search\", \"args\": {\"query\": \"kiwi\"}}\n```").unwrap();
        assert!(matches!(out, PlannerOutput::ToolCall(tc) if tc.tool == "wiki_search"));
    }

    #[test]
    fn test_parse_invalid_leading_json_is_error() {
        let err = parse_llm_output(r#"{"tool": "nutrition_fetch", "args": "#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_inline_braces_in_answer_are_not_tool_calls() {
        let text = "Totals {approx}: 320 kcal";
        match parse_llm_output(text).unwrap() {
            PlannerOutput::Response(r) => assert_eq!(r, text),
            _ => panic!("Expected Response"),
        }
    }
}
