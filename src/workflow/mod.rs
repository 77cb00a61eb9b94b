//! 营养分析工作流：路由、节点与引擎

pub mod engine;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod types;

pub use engine::WorkflowEngine;
pub use graph::route;
pub use nodes::{FetchAggregateNode, FollowUpNode, IdentifyNode, WorkflowNode};
pub use types::*;
