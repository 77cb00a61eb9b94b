//! 核心层：错误与恢复、引擎组装、优雅关闭

pub mod builder;
pub mod error;
pub mod recovery;
pub mod shutdown;

pub use builder::{
    build_tool_registry, build_tool_source, create_llm_from_config, create_vision_from_config, EngineBuilder,
};
pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use shutdown::{ShutdownManager, ShutdownReason};
