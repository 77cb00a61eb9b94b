//! wiki_search 工具：Wikipedia 搜索 + 摘要
//!
//! 先用 list=search 取前 top_k 个标题，再并发取各页 intro 纯文本摘要（保持搜索排序），
//! 输出 `Page: <title>\nSummary: <extract>` 块，以空行分隔，总长度上限 max_chars。
//! 上游失败返回 `{"error": ...}` 而非 Err；单页摘要失败时跳过该页。只有参数错误才返回 Err。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};

use crate::tools::{query_args_schema, QueryArgs, Tool};

pub const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

pub struct WikiSearchTool {
    client: Client,
    endpoint: String,
    top_k: usize,
    max_chars: usize,
}

/// 从 list=search 响应中取标题
fn parse_search_titles(body: &Value) -> Vec<String> {
    body.pointer("/query/search")
        .and_then(|v| v.as_array())
        .map(|hits| {
            hits.iter()
                .filter_map(|h| h.get("title").and_then(|t| t.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// 从 prop=extracts 响应中取第一页的摘要
fn parse_extract(body: &Value) -> Option<String> {
    body.pointer("/query/pages")
        .and_then(|v| v.as_object())
        .and_then(|pages| pages.values().next())
        .and_then(|page| page.get("extract"))
        .and_then(|e| e.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn render_pages(pages: &[(String, String)], max_chars: usize) -> String {
    if pages.is_empty() {
        return NO_RESULT.to_string();
    }
    let text = pages
        .iter()
        .map(|(title, summary)| format!("Page: {title}\nSummary: {summary}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    text.chars().take(max_chars).collect()
}

impl WikiSearchTool {
    pub fn new(endpoint: impl Into<String>, top_k: usize, max_chars: usize, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("nutrilens/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            top_k,
            max_chars,
        }
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status, body));
        }
        serde_json::from_str(&body).map_err(|e| format!("invalid upstream JSON: {}", e))
    }

    async fn search(&self, query: &str) -> Value {
        let limit = self.top_k.to_string();
        let hits = match self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("format", "json"),
            ])
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "wikipedia search failed");
                return json!({ "error": e });
            }
        };

        let titles: Vec<String> = parse_search_titles(&hits).into_iter().take(self.top_k).collect();
        let extracts = join_all(titles.iter().map(|title| async move {
            self.get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title.as_str()),
                ("format", "json"),
            ])
            .await
        }))
        .await;

        let mut pages = Vec::with_capacity(titles.len());
        let mut first_error = None;
        for (title, extract) in titles.into_iter().zip(extracts) {
            match extract {
                Ok(body) => {
                    if let Some(summary) = parse_extract(&body) {
                        pages.push((title, summary));
                    }
                }
                Err(e) => {
                    tracing::warn!(title = %title, error = %e, "wikipedia extract failed, skipping page");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) if pages.is_empty() => json!({ "error": e }),
            _ => Value::String(render_pages(&pages, self.max_chars)),
        }
    }
}

#[async_trait]
impl Tool for WikiSearchTool {
    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Fetch data via wikipedia api: general background knowledge about foods, nutrients or anything else. Args: {\"query\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        query_args_schema()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args = QueryArgs::from_args(args)?;
        tracing::info!(query = %args.query, "wiki_search");
        Ok(self.search(&args.query).await)
    }
}
