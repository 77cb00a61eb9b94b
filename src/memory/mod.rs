//! 消息层：LLM 对话消息与单次调用记录

pub mod conversation;

pub use conversation::{Message, Role, Transcript};
