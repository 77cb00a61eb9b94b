//! nutrition_fetch 工具：Nutritionix 自然语言营养查询
//!
//! POST {endpoint} `{"query": "..."}`，请求头携带 x-app-id / x-app-key。
//! 上游非 2xx 时返回 `{"error": <响应体文本>}` 而非 Err，供 Agent 自行判断；成功时原样返回上游 JSON。
//! 凭据缺失时以空请求头发送，由上游返回认证失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::tools::{query_args_schema, QueryArgs, Tool};

pub const NUTRITIONIX_ENDPOINT: &str = "https://trackapi.nutritionix.com/v2/natural/nutrients";

/// Nutritionix 凭据（装配时从环境变量解析后显式传入）
#[derive(Debug, Clone, Default)]
pub struct NutritionCredentials {
    pub app_id: Option<String>,
    pub api_key: Option<String>,
}

impl NutritionCredentials {
    pub fn is_complete(&self) -> bool {
        self.app_id.is_some() && self.api_key.is_some()
    }
}

pub struct NutritionFetchTool {
    client: Client,
    endpoint: String,
    credentials: NutritionCredentials,
}

impl NutritionFetchTool {
    pub fn new(endpoint: impl Into<String>, credentials: NutritionCredentials, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        if !credentials.is_complete() {
            tracing::warn!("Nutritionix credentials missing; nutrition_fetch will report upstream auth errors");
        }
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    async fn fetch(&self, query: &str) -> Value {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-app-id", self.credentials.app_id.as_deref().unwrap_or(""))
            .header("x-app-key", self.credentials.api_key.as_deref().unwrap_or(""))
            .json(&json!({ "query": query }))
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return json!({ "error": format!("request failed: {e}") }),
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return json!({ "error": format!("read body: {e}") }),
        };

        if !status.is_success() {
            tracing::warn!(status = %status, query = %query, "nutritionix returned non-success");
            return json!({ "error": body });
        }

        serde_json::from_str(&body)
            .unwrap_or_else(|e| json!({ "error": format!("invalid upstream JSON: {e}") }))
    }
}

#[async_trait]
impl Tool for NutritionFetchTool {
    fn name(&self) -> &str {
        "nutrition_fetch"
    }

    fn description(&self) -> &str {
        "Fetch nutrition facts (calories, protein, ...) for a natural-language food query such as \"2 medium bananas\". Args: {\"query\": \"...\"}. Returns the provider JSON, or {\"error\": \"...\"} on failure."
    }

    fn parameters_schema(&self) -> Value {
        query_args_schema()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args = QueryArgs::from_args(args)?;
        tracing::info!(query = %args.query, "nutrition_fetch");
        Ok(self.fetch(&args.query).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::spawn_http_stub;

    fn creds() -> NutritionCredentials {
        NutritionCredentials {
            app_id: Some("app-123".to_string()),
            api_key: Some("key-456".to_string()),
        }
    }

    #[tokio::test]
    async fn test_success_returns_upstream_json_verbatim() {
        let (url, captured) = spawn_http_stub(|_| {
            (200, r#"{"foods":[{"food_name":"banana","nf_calories":105.0,"nf_protein":1.3}]}"#.to_string())
        })
        .await;
        let tool = NutritionFetchTool::new(format!("{url}/v2/natural/nutrients"), creds(), 5);

        let out = tool.execute(json!({"query": "1 banana"})).await.unwrap();
        assert_eq!(out["foods"][0]["food_name"], "banana");
        assert_eq!(out["foods"][0]["nf_calories"], 105.0);

        let raw = captured.lock().unwrap()[0].to_lowercase();
        assert!(raw.starts_with("post /v2/natural/nutrients"));
        assert!(raw.contains("x-app-id: app-123"));
        assert!(raw.contains("x-app-key: key-456"));
        assert!(raw.contains(r#""query":"1 banana""#));
    }

    #[tokio::test]
    async fn test_non_success_becomes_error_payload() {
        let (url, _) = spawn_http_stub(|_| (404, r#"{"message":"We couldn't match any of your foods"}"#.to_string())).await;
        let tool = NutritionFetchTool::new(url, creds(), 5);

        let out = tool.execute(json!({"query": "moon rock"})).await.unwrap();
        assert_eq!(out, json!({"error": r#"{"message":"We couldn't match any of your foods"}"#}));
    }

    #[tokio::test]
    async fn test_missing_credentials_surface_as_auth_error() {
        let (url, captured) = spawn_http_stub(|raw| {
            if raw.to_lowercase().contains("x-app-id: \r\n") {
                (401, "unauthorized".to_string())
            } else {
                (200, "{}".to_string())
            }
        })
        .await;
        let tool = NutritionFetchTool::new(url, NutritionCredentials::default(), 5);

        let out = tool.execute(json!({"query": "apple"})).await.unwrap();
        assert_eq!(out, json!({"error": "unauthorized"}));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_error_payload() {
        let tool = NutritionFetchTool::new("http://127.0.0.1:1/nutrients", creds(), 2);
        let out = tool.execute(json!({"query": "apple"})).await.unwrap();
        assert!(out["error"].as_str().unwrap().starts_with("request failed"));
    }

    #[tokio::test]
    async fn test_missing_query_is_err() {
        let tool = NutritionFetchTool::new(NUTRITIONIX_ENDPOINT, creds(), 2);
        assert!(tool.execute(json!({})).await.is_err());
    }
}
