//! 工具 JSON Schema 生成（schemars 自动生成）
//!
//! tool_call_schema_json 注入 system prompt，减少 LLM 输出格式错误；
//! query_args_schema 作为 nutrition_fetch / wiki_search 的参数 schema。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

/// 工具调用请求格式：与 ReAct 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 nutrition_fetch、wiki_search
    pub tool: String,
    /// 工具参数，依工具不同而不同
    pub args: serde_json::Map<String, Value>,
}

/// 单一自然语言查询参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// 自然语言查询，如 "2 medium bananas"
    pub query: String,
}

impl QueryArgs {
    /// 从工具参数中解析 query，空字符串视为缺失
    pub fn from_args(args: Value) -> Result<Self, String> {
        let parsed: QueryArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {e}"))?;
        if parsed.query.trim().is_empty() {
            return Err("Missing query".to_string());
        }
        Ok(parsed)
    }
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

pub fn query_args_schema() -> Value {
    serde_json::to_value(schema_for!(QueryArgs)).unwrap_or(Value::Null)
}
