//! 工作流节点：identify / fetch-and-aggregate / follow-up
//!
//! 节点只读取合并后的会话状态，返回自己写入的字段（StateUpdate），由引擎合并。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{AgentInstruction, ReasoningAgent};
use crate::llm::{ImageInput, VisionClassifier};
use crate::tools::{load_tools_or_empty, ToolExecutor, ToolSource};
use crate::workflow::prompts;
use crate::workflow::types::{CalorieState, NodeName, StateUpdate, WorkflowError};

const NUTRITION_TOOL: &str = "nutrition_fetch";

#[async_trait]
pub trait WorkflowNode: Send + Sync {
    fn name(&self) -> NodeName;

    async fn run(&self, state: &CalorieState) -> Result<StateUpdate, WorkflowError>;
}

/// 识别图片中的食物，写入 food_items；分类器错误直接上抛
pub struct IdentifyNode {
    vision: Arc<dyn VisionClassifier>,
}

impl IdentifyNode {
    pub fn new(vision: Arc<dyn VisionClassifier>) -> Self {
        Self { vision }
    }
}

#[async_trait]
impl WorkflowNode for IdentifyNode {
    fn name(&self) -> NodeName {
        NodeName::Identify
    }

    async fn run(&self, state: &CalorieState) -> Result<StateUpdate, WorkflowError> {
        let (Some(bytes), Some(mime)) = (&state.image_bytes, &state.mime) else {
            return Err(WorkflowError::InvalidInput("identify requires image bytes and a MIME type".into()));
        };
        let image = ImageInput::new(bytes.clone(), mime.clone())?;
        tracing::debug!(mime = %image.mime(), bytes = image.len(), "classifying image");
        let listing = self.vision.classify(&image, prompts::IDENTIFY_INSTRUCTION).await?;
        Ok(StateUpdate::food_items(listing))
    }
}

/// 按条目查询营养数据并汇总，写入 result；任何失败都转为固定消息
pub struct FetchAggregateNode {
    agent: Arc<dyn ReasoningAgent>,
    tools: Arc<dyn ToolSource>,
    tool_timeout_secs: u64,
}

impl FetchAggregateNode {
    pub fn new(agent: Arc<dyn ReasoningAgent>, tools: Arc<dyn ToolSource>, tool_timeout_secs: u64) -> Self {
        Self {
            agent,
            tools,
            tool_timeout_secs,
        }
    }
}

#[async_trait]
impl WorkflowNode for FetchAggregateNode {
    fn name(&self) -> NodeName {
        NodeName::FetchAggregate
    }

    async fn run(&self, state: &CalorieState) -> Result<StateUpdate, WorkflowError> {
        let Some(food_items) = state.food_items.as_deref().filter(|s| !s.is_empty()) else {
            tracing::warn!("fetch_aggregate reached without food items");
            return Ok(StateUpdate::result(prompts::FETCH_FAILED));
        };

        let registry = load_tools_or_empty(self.tools.as_ref()).await.subset(&[NUTRITION_TOOL]);
        let executor = ToolExecutor::new(registry, self.tool_timeout_secs);
        let instruction = AgentInstruction::new(prompts::FETCH_SYSTEM, prompts::fetch_prompt(food_items));

        match self.agent.run(&instruction, &executor).await {
            Ok(text) => Ok(StateUpdate::result(text)),
            Err(e) => {
                tracing::warn!(error = %e, "nutrition aggregation failed");
                Ok(StateUpdate::result(prompts::FETCH_FAILED))
            }
        }
    }
}

/// 基于上一轮分析回答追问，写入 user_result；失败时返回固定提示
pub struct FollowUpNode {
    agent: Arc<dyn ReasoningAgent>,
    tools: Arc<dyn ToolSource>,
    tool_timeout_secs: u64,
}

impl FollowUpNode {
    pub fn new(agent: Arc<dyn ReasoningAgent>, tools: Arc<dyn ToolSource>, tool_timeout_secs: u64) -> Self {
        Self {
            agent,
            tools,
            tool_timeout_secs,
        }
    }
}

#[async_trait]
impl WorkflowNode for FollowUpNode {
    fn name(&self) -> NodeName {
        NodeName::FollowUp
    }

    async fn run(&self, state: &CalorieState) -> Result<StateUpdate, WorkflowError> {
        let context = state.result.as_deref().filter(|s| !s.is_empty());
        let query = state.user_query.as_deref().filter(|s| !s.is_empty());

        let (Some(query), Some(context)) = (query, context) else {
            let text = match (query, context) {
                (None, Some(ctx)) => ctx,
                _ => prompts::NO_RESULT_YET,
            };
            return Ok(StateUpdate::user_result(text));
        };

        let executor = ToolExecutor::new(load_tools_or_empty(self.tools.as_ref()).await, self.tool_timeout_secs);
        let instruction =
            AgentInstruction::new(prompts::FOLLOW_UP_SYSTEM, prompts::follow_up_prompt(query)).with_context(context);

        match self.agent.run(&instruction, &executor).await {
            Ok(text) => Ok(StateUpdate::user_result(text)),
            Err(e) => {
                tracing::warn!(error = %e, "follow-up answer failed");
                Ok(StateUpdate::user_result(prompts::FOLLOW_UP_FAILED))
            }
        }
    }
}
