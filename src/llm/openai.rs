//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、DeepSeek、自建代理等。
//! 除文本对话外，complete_with_image 将图片以 base64 data URI 形式随指令一起发送（视觉识别用）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    /// api_key 由调用方在装配时显式传入（不在此处读环境变量）
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout_secs: u64) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        messages
            .iter()
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                msg.map_err(|e| e.to_string())
            })
            .collect()
    }

    /// 发送请求并取首条 content；超时与 API 错误均转为字符串错误
    async fn send(&self, request: CreateChatCompletionRequest) -> Result<String, String> {
        let response = timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| format!("LLM request timed out after {:?}", self.request_timeout))?
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    /// 单条 user 消息：文本指令 + 图片（data URI）
    pub async fn complete_with_image(&self, instruction: &str, data_uri: &str) -> Result<String, String> {
        let image = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_uri)
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(|e| e.to_string())?,
            )
            .build()
            .map_err(|e| e.to_string())?;
        let text = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(instruction)
            .build()
            .map_err(|e| e.to_string())?;
        let parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            vec![image.into(), text.into()];

        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| e.to_string())?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(user)])
            .build()
            .map_err(|e| e.to_string())?;

        self.send(request).await
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_openai_messages(messages)?)
            .build()
            .map_err(|e| e.to_string())?;

        self.send(request).await
    }
}
