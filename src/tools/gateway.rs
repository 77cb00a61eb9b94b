//! 工具网关：工具集的来源
//!
//! ToolSource 负责在每次节点执行前提供工具集：
//! - LocalToolSource：进程内注册的 nutrition_fetch / wiki_search；
//! - RemoteToolGateway：通过 HTTP 工具协议（GET {base}/tools，POST {base}/tools/call）加载远端工具。
//!
//! 工具集加载失败（网关不可达）时 load_tools_or_empty 返回空工具集，节点照常执行。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::{Tool, ToolRegistry};

/// 工具网关错误
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Tool gateway unreachable: {0}")]
    Unreachable(String),

    #[error("Tool gateway protocol error: {0}")]
    Protocol(String),
}

/// 工具协议中的工具描述
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// POST {base}/tools/call 请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// POST {base}/tools/call 响应体：content 为工具输出，is_error 表示调用本身失败（参数错误、未知工具）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResponse {
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: Value::String(message.into()),
            is_error: true,
        }
    }
}

/// 工具集来源
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn load_tools(&self) -> Result<ToolRegistry, GatewayError>;
}

/// 加载工具集；失败时记录警告并返回空工具集
pub async fn load_tools_or_empty(source: &dyn ToolSource) -> ToolRegistry {
    match source.load_tools().await {
        Ok(registry) => registry,
        Err(e) => {
            tracing::warn!(error = %e, "tool set unavailable, continuing with no tools");
            ToolRegistry::new()
        }
    }
}

/// 进程内工具集
pub struct LocalToolSource {
    registry: ToolRegistry,
}

impl LocalToolSource {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolSource for LocalToolSource {
    async fn load_tools(&self) -> Result<ToolRegistry, GatewayError> {
        Ok(self.registry.clone())
    }
}

/// 远端工具网关客户端
pub struct RemoteToolGateway {
    client: Client,
    base_url: String,
}

impl RemoteToolGateway {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ToolSource for RemoteToolGateway {
    async fn load_tools(&self) -> Result<ToolRegistry, GatewayError> {
        let url = format!("{}/tools", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(GatewayError::Unreachable(format!("HTTP {}", resp.status())));
        }
        let descriptors: Vec<ToolDescriptor> = resp
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let mut registry = ToolRegistry::new();
        for descriptor in descriptors {
            registry.register_arc(Arc::new(RemoteTool {
                client: self.client.clone(),
                call_url: format!("{}/tools/call", self.base_url),
                descriptor,
            }));
        }
        tracing::debug!(tools = ?registry.tool_names(), "loaded remote tools");
        Ok(registry)
    }
}

/// 远端工具代理：execute 转为 POST {base}/tools/call
struct RemoteTool {
    client: Client,
    call_url: String,
    descriptor: ToolDescriptor,
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> Value {
        self.descriptor.input_schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let request = ToolCallRequest {
            name: self.descriptor.name.clone(),
            arguments: args,
        };
        let resp = self
            .client
            .post(&self.call_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: ToolCallResponse = resp.json().await.map_err(|e| format!("Read body: {}", e))?;
        if body.is_error {
            return Err(match body.content {
                Value::String(s) => s,
                other => other.to_string(),
            });
        }
        Ok(body.content)
    }
}
