//! 可观测性：tracing 订阅器初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 安装全局订阅器；RUST_LOG 未设置时默认 info
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试等场景可能重复初始化，忽略错误
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
