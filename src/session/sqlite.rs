//! SQLite 会话存储：checkpoint 以 JSON 文本保存，进程重启后仍可恢复
//!
//! rusqlite 为同步 API，读写放在 spawn_blocking 中执行。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::checkpoint::Checkpoint;
use super::store::{SessionStore, StoreError};
use crate::workflow::CalorieState;

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct SqliteSessionStore {
    db_path: PathBuf,
}

impl SqliteSessionStore {
    /// 打开数据库并确保表存在
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(backend_err)?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                turn INTEGER NOT NULL,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(backend_err)?;
        Ok(Self { db_path })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(backend_err)?;
            f(&conn)
        })
        .await
        .map_err(backend_err)?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let id = thread_id.to_string();
        let row = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT turn, state, updated_at FROM checkpoints WHERE thread_id = ?1",
                    params![id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
                )
                .optional()
                .map_err(backend_err)
            })
            .await?;

        let Some((turn, state, updated_at)) = row else {
            return Ok(None);
        };
        let state: CalorieState = serde_json::from_str(&state)?;
        Ok(Some(Checkpoint {
            thread_id: thread_id.to_string(),
            state,
            turn: turn.max(0) as u64,
            updated_at,
        }))
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let state = serde_json::to_string(&checkpoint.state)?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (thread_id, turn, state, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![checkpoint.thread_id, checkpoint.turn as i64, state, checkpoint.updated_at],
            )
            .map_err(backend_err)?;
            Ok(())
        })
        .await
    }

    async fn thread_count(&self) -> Result<usize, StoreError> {
        self.blocking(|conn| {
            conn.query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get::<_, i64>(0))
                .map(|n| n.max(0) as usize)
                .map_err(backend_err)
        })
        .await
    }
}
