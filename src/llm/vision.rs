//! 视觉识别：图片 + 指令 → 食物清单文本
//!
//! VisionClassifier 是外部视觉模型的抽象；OpenAiVisionClassifier 通过 OpenAI 兼容端点实现，
//! 图片以 base64 data URI 发送。无可用后端时使用 UnconfiguredVision，识别请求直接失败。

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

use crate::llm::OpenAiClient;

/// 视觉识别错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisionError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Vision request failed: {0}")]
    Request(String),

    #[error("Vision model returned an empty response")]
    EmptyResponse,

    #[error("No vision provider configured")]
    NotConfigured,
}

/// 待识别图片：原始字节 + MIME 类型
#[derive(Debug, Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime: String,
}

impl ImageInput {
    /// 校验非空且 MIME 为 image/*
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Result<Self, VisionError> {
        let mime = mime.into();
        if bytes.is_empty() {
            return Err(VisionError::InvalidImage("empty image bytes".to_string()));
        }
        if !mime.starts_with("image/") {
            return Err(VisionError::InvalidImage(format!("unsupported mime type: {mime}")));
        }
        Ok(Self { bytes, mime })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime, encoded)
    }
}

/// 视觉识别 trait：返回模型的原始文本
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    async fn classify(&self, image: &ImageInput, instruction: &str) -> Result<String, VisionError>;
}

/// OpenAI 兼容视觉模型
pub struct OpenAiVisionClassifier {
    client: Arc<OpenAiClient>,
}

impl OpenAiVisionClassifier {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VisionClassifier for OpenAiVisionClassifier {
    async fn classify(&self, image: &ImageInput, instruction: &str) -> Result<String, VisionError> {
        tracing::debug!(mime = %image.mime(), bytes = image.len(), model = %self.client.model(), "vision request");
        let text = self
            .client
            .complete_with_image(instruction, &image.to_data_uri())
            .await
            .map_err(VisionError::Request)?;
        if text.trim().is_empty() {
            return Err(VisionError::EmptyResponse);
        }
        Ok(text)
    }
}

/// 未配置视觉后端：所有识别请求返回 NotConfigured
#[derive(Debug, Default)]
pub struct UnconfiguredVision;

#[async_trait]
impl VisionClassifier for UnconfiguredVision {
    async fn classify(&self, _image: &ImageInput, _instruction: &str) -> Result<String, VisionError> {
        Err(VisionError::NotConfigured)
    }
}
