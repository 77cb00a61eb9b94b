//! 优雅关闭：监听 Ctrl+C / SIGTERM，通过 CancellationToken 通知各服务退出

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C 或 /quit
    UserInitiated,
    /// SIGTERM
    Signal,
}

/// 关闭信号管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取关闭 token（用于取消正在进行的任务）
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(?reason, "shutting down");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        assert!(!manager.is_shutdown());
        manager.shutdown(ShutdownReason::UserInitiated);
        waiter.await.unwrap();
        assert!(manager.is_shutdown());
        manager.wait_for_shutdown().await;
    }
}
