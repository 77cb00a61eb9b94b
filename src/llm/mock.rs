//! Mock LLM / 视觉客户端（用于测试与离线运行，无需 API）
//!
//! MockLlmClient 按脚本依次返回预设输出，并记录每次收到的消息；脚本耗尽后回显最后一条 User 消息。
//! MockVisionClassifier 返回固定文本或固定错误。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ImageInput, LlmClient, VisionClassifier, VisionError};
use crate::memory::{Message, Role};

/// Mock 客户端：脚本化输出 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定输出
    pub fn scripted<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(outputs.into_iter().map(|s| Ok(s.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 第一次调用即返回错误
    pub fn failing(error: impl Into<String>) -> Self {
        let mut script = VecDeque::new();
        script.push_back(Err(error.into()));
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 迄今每次 complete 收到的完整消息列表
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(output) = next {
            return output;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// Mock 视觉识别：固定输出或固定错误，并统计调用次数
#[derive(Debug)]
pub struct MockVisionClassifier {
    output: Result<String, VisionError>,
    calls: AtomicUsize,
}

impl MockVisionClassifier {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            output: Ok(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: VisionError) -> Self {
        Self {
            output: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClassifier for MockVisionClassifier {
    async fn classify(&self, _image: &ImageInput, _instruction: &str) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outputs_then_echo() {
        let llm = MockLlmClient::scripted(["first", "second"]);
        let msgs = vec![Message::user("banana?")];
        assert_eq!(llm.complete(&msgs).await.unwrap(), "first");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "second");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "Echo from Mock: banana?");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_client() {
        let llm = MockLlmClient::failing("quota exceeded");
        let err = llm.complete(&[Message::user("x")]).await.unwrap_err();
        assert_eq!(err, "quota exceeded");
    }
}
