//! 工具箱：nutrition_fetch / wiki_search、工具注册表、执行器与工具网关

pub mod executor;
pub mod gateway;
pub mod nutrition;
pub mod registry;
pub mod schema;
pub mod wiki;

#[cfg(test)]
pub(crate) mod test_support;

pub use executor::ToolExecutor;
pub use gateway::{
    load_tools_or_empty, GatewayError, LocalToolSource, RemoteToolGateway, ToolCallRequest,
    ToolCallResponse, ToolDescriptor, ToolSource,
};
pub use nutrition::{NutritionCredentials, NutritionFetchTool, NUTRITIONIX_ENDPOINT};
pub use registry::{Tool, ToolRegistry};
pub use schema::{query_args_schema, tool_call_schema_json, QueryArgs};
pub use wiki::{WikiSearchTool, WIKIPEDIA_API};
