//! 会话存储：按 thread_id 保存每轮结束后的 checkpoint

pub mod checkpoint;
pub mod sqlite;
pub mod store;

pub use checkpoint::Checkpoint;
pub use sqlite::SqliteSessionStore;
pub use store::{create_session_store, MemorySessionStore, SessionStore, StoreError};
