//! 工作流引擎
//!
//! 每轮：加线程锁 → 读 checkpoint → 清理上一轮字段并合并输入 → 路由并遍历节点 → 写 checkpoint。
//! 同一线程的轮次串行执行，不同线程并发执行。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::session::{Checkpoint, SessionStore};
use crate::workflow::graph;
use crate::workflow::nodes::WorkflowNode;
use crate::workflow::types::*;

/// 按 thread_id 分配的轮次锁；没有轮次在用或等待时移除条目
#[derive(Default)]
struct ThreadLocks {
    locks: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    async fn acquire(&self, thread_id: &str) -> TurnLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        TurnLock {
            owner: self,
            thread_id: thread_id.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// 只剩 map 与调用方两份引用时移除
    fn release(&self, thread_id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = locks
            .get(thread_id)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(thread_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

/// 持有期间独占一个线程的轮次
struct TurnLock<'a> {
    owner: &'a ThreadLocks,
    thread_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for TurnLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.owner.release(&self.thread_id, &self.lock);
    }
}

/// 工作流引擎
pub struct WorkflowEngine {
    store: Arc<dyn SessionStore>,
    identify: Arc<dyn WorkflowNode>,
    fetch_aggregate: Arc<dyn WorkflowNode>,
    follow_up: Arc<dyn WorkflowNode>,
    locks: ThreadLocks,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        identify: Arc<dyn WorkflowNode>,
        fetch_aggregate: Arc<dyn WorkflowNode>,
        follow_up: Arc<dyn WorkflowNode>,
    ) -> Self {
        Self {
            store,
            identify,
            fetch_aggregate,
            follow_up,
            locks: ThreadLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn node(&self, name: NodeName) -> &dyn WorkflowNode {
        match name {
            NodeName::Identify => self.identify.as_ref(),
            NodeName::FetchAggregate => self.fetch_aggregate.as_ref(),
            NodeName::FollowUp => self.follow_up.as_ref(),
        }
    }

    /// 执行一轮
    ///
    /// 节点出错时不写 checkpoint，线程状态保持上一轮结束时的样子。
    pub async fn invoke(&self, thread_id: &str, input: TurnInput) -> Result<TurnOutput, WorkflowError> {
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return Err(WorkflowError::InvalidInput("thread id must not be empty".into()));
        }

        let _turn = self.locks.acquire(thread_id).await;

        let previous = self.store.get(thread_id).await?;
        let mut state = previous.as_ref().map(|c| c.state.clone()).unwrap_or_default();
        state.clear_turn_fields();
        state.merge(input);

        let intent = TurnIntent::of(&state);
        let route = graph::route_intent(intent);
        tracing::info!(thread_id, ?intent, ?route, "turn started");

        let mut visited = Vec::new();
        let mut current = route.entry();
        while let Some(name) = current {
            let node = self.node(name);
            tracing::info!(thread_id, node = %node.name(), "node started");
            let update = node.run(&state).await.map_err(|e| {
                tracing::warn!(thread_id, node = %name, error = %e, "turn failed");
                e
            })?;
            update.apply(&mut state);
            visited.push(name);
            tracing::info!(thread_id, node = %name, "node finished");
            current = graph::next(name);
        }

        let checkpoint = Checkpoint::next(thread_id, previous.as_ref(), state);
        let output = TurnOutput {
            thread_id: thread_id.to_string(),
            route,
            visited,
            turn: checkpoint.turn,
            food_items: checkpoint.state.food_items.clone(),
            result: checkpoint.state.result.clone(),
            user_result: checkpoint.state.user_result.clone(),
        };
        self.store.put(checkpoint).await?;
        tracing::info!(thread_id, turn = output.turn, "turn finished");
        Ok(output)
    }

    /// 读取线程当前 checkpoint
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        Ok(self.store.get(thread_id).await?)
    }
}
