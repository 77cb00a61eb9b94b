//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与视觉识别

pub mod mock;
pub mod openai;
pub mod traits;
pub mod vision;

pub use mock::{MockLlmClient, MockVisionClassifier};
pub use openai::{OpenAiClient, TokenUsage, DEEPSEEK_BASE_URL};
pub use traits::LlmClient;
pub use vision::{ImageInput, OpenAiVisionClassifier, UnconfiguredVision, VisionClassifier, VisionError};
