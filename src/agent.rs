//! 推理 Agent 抽象
//!
//! 工作流节点只依赖 ReasoningAgent：给定指令（system prompt + 任务 + 可选上下文）与工具集，返回最终文本。
//! Agent 内部调用哪些工具、调用几次，对节点不可见。实现：
//! - ReactAgent：LLM 驱动的 ReAct 循环（react::loop_）；
//! - TallyAgent：无 LLM 时的规则汇总（react::tally）。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::tools::ToolExecutor;

/// 一次 Agent 调用的指令
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentInstruction {
    /// 角色与行为约束
    pub system: String,
    /// 本次任务（用户侧消息）
    pub prompt: String,
    /// 先前的分析结果等上下文
    pub context: Option<String>,
}

impl AgentInstruction {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// 拼成发给模型的用户消息：有上下文时置于任务之前
    pub fn user_message(&self) -> String {
        match &self.context {
            Some(ctx) => format!("Previous nutrition analysis: {}\n\n{}", ctx, self.prompt),
            None => self.prompt.clone(),
        }
    }
}

/// 推理 Agent：指令 + 工具集 → 最终文本
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    async fn run(&self, instruction: &AgentInstruction, tools: &ToolExecutor) -> Result<String, AgentError>;
}
