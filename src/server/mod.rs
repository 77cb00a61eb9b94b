//! HTTP 服务：轮次 API 与工具网关（web feature）

pub mod tool_api;
pub mod turn_api;

pub use tool_api::tool_router;
pub use turn_api::turn_router;
