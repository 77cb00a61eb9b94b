//! 会话存储抽象层
//!
//! 定义统一的 checkpoint 读写接口，支持内存和 SQLite 两种实现

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::checkpoint::Checkpoint;
use super::sqlite::SqliteSessionStore;
use crate::config::SessionConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),

    #[error("checkpoint serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取线程最近的 checkpoint；未知线程返回 None
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// 写入（覆盖）线程的 checkpoint
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// 已有 checkpoint 的线程数
    async fn thread_count(&self) -> Result<usize, StoreError>;
}

/// 内存会话存储，进程退出即丢失
#[derive(Default)]
pub struct MemorySessionStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn thread_count(&self) -> Result<usize, StoreError> {
        Ok(self.checkpoints.read().await.len())
    }
}

/// 创建会话存储
///
/// backend 为 "sqlite" 时打开 db_path；打开失败回退到内存存储
pub fn create_session_store(cfg: &SessionConfig) -> Arc<dyn SessionStore> {
    if cfg.backend.eq_ignore_ascii_case("sqlite") {
        match SqliteSessionStore::open(&cfg.db_path) {
            Ok(store) => {
                tracing::info!(path = %cfg.db_path.display(), "Using SQLite session store");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite session store, falling back to memory: {}", e);
            }
        }
    } else if !cfg.backend.eq_ignore_ascii_case("memory") {
        tracing::warn!(backend = %cfg.backend, "Unknown session backend, using memory store");
    }

    tracing::info!("Using in-memory session store");
    Arc::new(MemorySessionStore::new())
}
