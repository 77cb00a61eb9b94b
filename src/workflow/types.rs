//! 工作流类型定义
//!
//! 会话状态（CalorieState）、客户端每轮提交的部分状态（TurnInput）、
//! 轮次意图与路由结果、节点名、节点输出与工作流错误。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::VisionError;
use crate::session::StoreError;

pub type ThreadId = String;

/// 字段「存在」：Some 且非空
fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/// 会话状态：每个线程一份，经 checkpoint 跨轮次保存
///
/// image_bytes / mime 只在提交图片的那一轮存在，不写入 checkpoint。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalorieState {
    #[serde(skip)]
    pub image_bytes: Option<Vec<u8>>,
    #[serde(skip)]
    pub mime: Option<String>,
    /// 识别出的食物清单（identify 产出，fetch-and-aggregate 消费）
    #[serde(default)]
    pub food_items: Option<String>,
    /// 营养汇总结果，跨轮次保留，作为追问的上下文
    #[serde(default)]
    pub result: Option<String>,
    /// 本轮追问
    #[serde(default)]
    pub user_query: Option<String>,
    /// 最近一次追问的回答
    #[serde(default)]
    pub user_result: Option<String>,
}

impl CalorieState {
    pub fn has_image(&self) -> bool {
        self.image_bytes.as_ref().is_some_and(|b| !b.is_empty()) && present(&self.mime)
    }

    pub fn has_query(&self) -> bool {
        present(&self.user_query)
    }

    pub fn has_result(&self) -> bool {
        present(&self.result)
    }

    /// 新一轮开始前清除只属于上一轮的字段
    pub fn clear_turn_fields(&mut self) {
        self.image_bytes = None;
        self.mime = None;
        self.user_query = None;
        self.user_result = None;
    }

    /// 合并客户端提交的部分状态：提交的字段覆盖已有字段
    pub fn merge(&mut self, input: TurnInput) {
        if input.image_bytes.is_some() {
            self.image_bytes = input.image_bytes;
        }
        if input.mime.is_some() {
            self.mime = input.mime;
        }
        if input.user_query.is_some() {
            self.user_query = input.user_query;
        }
        if input.result.is_some() {
            self.result = input.result;
        }
    }

    /// 写入 checkpoint 前去掉图片
    pub fn without_image(mut self) -> Self {
        self.image_bytes = None;
        self.mime = None;
        self
    }
}

/// 客户端每轮提交的部分状态（只提出输入，不直接写持久化状态）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnInput {
    pub image_bytes: Option<Vec<u8>>,
    pub mime: Option<String>,
    pub user_query: Option<String>,
    /// 客户端持有的上一轮结果（可选；缺省时使用 checkpoint 中的 result）
    pub result: Option<String>,
}

impl TurnInput {
    pub fn image(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            image_bytes: Some(bytes),
            mime: Some(mime.into()),
            ..Self::default()
        }
    }

    pub fn question(query: impl Into<String>) -> Self {
        Self {
            user_query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}

/// 轮次意图：在边界处由字段存在性一次性推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnIntent {
    /// 上传图片，开始新的分析
    ImageUpload,
    /// 追问；has_context 表示已有先前结果
    FollowUpQuestion { has_context: bool },
    /// 无可处理内容
    Empty,
}

impl TurnIntent {
    /// 优先级：追问+结果 > 图片 > 仅追问 > 空
    pub fn of(state: &CalorieState) -> Self {
        if state.has_query() && state.has_result() {
            TurnIntent::FollowUpQuestion { has_context: true }
        } else if state.has_image() {
            TurnIntent::ImageUpload
        } else if state.has_query() {
            TurnIntent::FollowUpQuestion { has_context: false }
        } else {
            TurnIntent::Empty
        }
    }
}

/// 节点名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    Identify,
    FetchAggregate,
    FollowUp,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::Identify => "identify",
            NodeName::FetchAggregate => "fetch_aggregate",
            NodeName::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由结果：入口节点或直接结束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Identify,
    FollowUp,
    End,
}

impl Route {
    pub fn entry(&self) -> Option<NodeName> {
        match self {
            Route::Identify => Some(NodeName::Identify),
            Route::FollowUp => Some(NodeName::FollowUp),
            Route::End => None,
        }
    }
}

/// 节点输出：只包含本节点写入的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub food_items: Option<String>,
    pub result: Option<String>,
    pub user_result: Option<String>,
}

impl StateUpdate {
    pub fn food_items(text: impl Into<String>) -> Self {
        Self {
            food_items: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn result(text: impl Into<String>) -> Self {
        Self {
            result: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn user_result(text: impl Into<String>) -> Self {
        Self {
            user_result: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn apply(self, state: &mut CalorieState) {
        if self.food_items.is_some() {
            state.food_items = self.food_items;
        }
        if self.result.is_some() {
            state.result = self.result;
        }
        if self.user_result.is_some() {
            state.user_result = self.user_result;
        }
    }
}

/// 一轮的返回
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutput {
    pub thread_id: ThreadId,
    pub route: Route,
    /// 本轮依次执行的节点
    pub visited: Vec<NodeName>,
    /// 已完成的轮次数（含本轮）
    pub turn: u64,
    pub food_items: Option<String>,
    pub result: Option<String>,
    pub user_result: Option<String>,
}

/// 工作流错误类型
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid turn input: {0}")]
    InvalidInput(String),

    #[error("Food identification failed: {0}")]
    Classifier(#[from] VisionError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}
