//! Checkpoint：某个线程最近一轮结束后的状态快照

use serde::{Deserialize, Serialize};

use crate::workflow::{CalorieState, ThreadId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    /// 不含图片字段（CalorieState 序列化时跳过）
    pub state: CalorieState,
    /// 已完成的轮次数
    pub turn: u64,
    /// 毫秒时间戳
    pub updated_at: i64,
}

impl Checkpoint {
    /// 由上一个 checkpoint（可无）与本轮结束状态生成下一个 checkpoint
    pub fn next(thread_id: &str, previous: Option<&Checkpoint>, state: CalorieState) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            state: state.without_image(),
            turn: previous.map(|c| c.turn).unwrap_or(0) + 1,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_increments_turn_and_drops_image() {
        let state = CalorieState {
            image_bytes: Some(vec![1, 2, 3]),
            mime: Some("image/jpeg".into()),
            food_items: Some("- apple (1, large)".into()),
            ..CalorieState::default()
        };
        let first = Checkpoint::next("t1", None, state.clone());
        assert_eq!(first.turn, 1);
        assert!(first.state.image_bytes.is_none());
        assert!(first.state.mime.is_none());

        let second = Checkpoint::next("t1", Some(&first), state);
        assert_eq!(second.turn, 2);
        assert!(second.updated_at >= first.updated_at);
    }
}
