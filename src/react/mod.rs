//! 推理层：Planner、ReAct 主循环（ReactAgent）与规则汇总（TallyAgent）

pub mod loop_;
pub mod planner;
pub mod tally;

pub use loop_::{ReactAgent, DEFAULT_MAX_STEPS};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
pub use tally::{extract_food_queries, TallyAgent};
