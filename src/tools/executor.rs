//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{Tool, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 空工具集（工具网关不可达时使用）
    pub fn empty(timeout_secs: u64) -> Self {
        Self::new(ToolRegistry::new(), timeout_secs)
    }

    /// 执行指定工具；未知工具返回 HallucinatedTool，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<Value, AgentError> {
        if !self.registry.contains(tool_name) {
            return Err(AgentError::HallucinatedTool(tool_name.to_string()));
        }

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(v)) if v.get("error").is_some() => (false, "upstream_error"),
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
