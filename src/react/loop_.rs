//! ReAct 主循环（ReactAgent）
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan，直到模型给出纯文本回复；支持 RetryWithPrompt 与最大步数限制。
//! 工具集为空时提示模型仅凭自身知识作答。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{AgentInstruction, ReasoningAgent};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::LlmClient;
use crate::memory::{Message, Transcript};
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput};
use crate::tools::{tool_call_schema_json, ToolExecutor};

/// 单次调用默认最大 ReAct 步数，防止死循环
pub const DEFAULT_MAX_STEPS: usize = 12;
/// Observation 写回上下文的最大字符数
const OBSERVATION_MAX_CHARS: usize = 8000;

/// LLM 驱动的推理 Agent
pub struct ReactAgent {
    planner: Planner,
    recovery: RecoveryEngine,
    max_steps: usize,
}

impl ReactAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            planner: Planner::new(llm),
            recovery: RecoveryEngine::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }
}

/// 拼 system prompt：指令自带的约束 + 工具说明
fn build_system_prompt(base: &str, tools: &ToolExecutor) -> String {
    if tools.is_empty() {
        return format!(
            "{base}\n\nNo tools are available right now. Answer from your own knowledge and say when figures are estimates."
        );
    }
    format!(
        "{base}\n\nAvailable tools:\n{}\n\n\
         To call a tool, reply with ONLY one JSON object matching this schema:\n{}\n\
         After each call you will receive an Observation. Call tools as many times as needed.\n\
         When you have the final answer, reply with plain text only (no JSON).",
        tools.registry().to_schema_json(),
        tool_call_schema_json()
    )
}

fn render_observation(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > OBSERVATION_MAX_CHARS {
        format!("{}\n...[truncated]", text.chars().take(OBSERVATION_MAX_CHARS).collect::<String>())
    } else {
        text
    }
}

#[async_trait]
impl ReasoningAgent for ReactAgent {
    async fn run(&self, instruction: &AgentInstruction, tools: &ToolExecutor) -> Result<String, AgentError> {
        let system = build_system_prompt(&instruction.system, tools);
        let tool_names = tools.tool_names();
        let mut transcript = Transcript::new();
        transcript.push(Message::user(instruction.user_message()));

        for step in 0..self.max_steps {
            let output = self.planner.plan_with_system(transcript.messages(), &system).await?;

            let parsed = match parse_llm_output(&output) {
                Ok(p) => p,
                Err(e) => match self.recovery.handle(&e, &tool_names) {
                    RecoveryAction::RetryWithPrompt(prompt) => {
                        tracing::debug!(step, error = %e, "agent output rejected, retrying");
                        transcript.push(Message::assistant(output));
                        transcript.push(Message::user(prompt));
                        continue;
                    }
                    RecoveryAction::Abort => return Err(e),
                },
            };

            match parsed {
                PlannerOutput::Response(text) => {
                    tracing::debug!(step, "agent finished");
                    return Ok(text);
                }
                PlannerOutput::ToolCall(tc) => {
                    tracing::debug!(step, tool = %tc.tool, "agent tool call");
                    transcript.push(Message::assistant(output));
                    match tools.execute(&tc.tool, tc.args).await {
                        Ok(value) => {
                            transcript.push(Message::user(format!(
                                "Observation ({}): {}",
                                tc.tool,
                                render_observation(&value)
                            )));
                        }
                        Err(e) => match self.recovery.handle(&e, &tool_names) {
                            RecoveryAction::RetryWithPrompt(prompt) => {
                                transcript.push(Message::user(prompt));
                            }
                            RecoveryAction::Abort => return Err(e),
                        },
                    }
                }
            }
        }

        Err(AgentError::MaxStepsExceeded(self.max_steps))
    }
}
