//! NutriLens - 食物照片营养分析工作流
//!
//! 模块划分：
//! - **agent**: 推理 Agent 抽象（指令 + 工具集 → 文本）
//! - **config**: 应用配置加载（TOML + 环境变量）与密钥
//! - **core**: 错误与恢复、引擎组装、优雅关闭
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与视觉识别
//! - **memory**: Agent 单次运行内的对话记录
//! - **react**: Planner、ReAct 主循环与离线汇总 Agent
//! - **session**: 按线程保存 checkpoint（内存 / SQLite）
//! - **tools**: nutrition_fetch / wiki_search、执行器与工具网关
//! - **workflow**: 路由、节点与工作流引擎
//! - **server**: 轮次 API 与工具网关 HTTP 服务（web feature）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
#[cfg(feature = "web")]
pub mod server;
pub mod session;
pub mod tools;
pub mod workflow;

pub use core::EngineBuilder;
pub use workflow::{TurnInput, TurnOutput, WorkflowEngine};
