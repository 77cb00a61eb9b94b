//! 引擎构建器：按配置组装 LLM、视觉分类器、推理 Agent、工具来源与会话存储
//!
//! CLI、Web 与工具服务共用这里的组装逻辑；没有可用的 API Key 时进入离线模式
//! （TallyAgent + 未配置的视觉分类器）。

use std::sync::Arc;

use crate::agent::ReasoningAgent;
use crate::config::{AppConfig, Secrets};
use crate::llm::{OpenAiClient, OpenAiVisionClassifier, UnconfiguredVision, VisionClassifier, DEEPSEEK_BASE_URL};
use crate::react::{ReactAgent, TallyAgent};
use crate::session::{create_session_store, SessionStore};
use crate::tools::{
    LocalToolSource, NutritionCredentials, NutritionFetchTool, RemoteToolGateway, ToolRegistry, ToolSource,
    WikiSearchTool,
};
use crate::workflow::{FetchAggregateNode, FollowUpNode, IdentifyNode, WorkflowEngine};

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// 按 provider 与可用的 Key 选择对话模型；返回 None 表示离线模式
///
/// - provider = mock：离线
/// - provider = deepseek 且有 DEEPSEEK_API_KEY：DeepSeek 兼容端点
/// - 有 OPENAI_API_KEY：OpenAI（或 base_url 指向的兼容端点）
/// - 只有 DEEPSEEK_API_KEY：DeepSeek
pub fn create_llm_from_config(cfg: &AppConfig, secrets: &Secrets) -> Option<Arc<OpenAiClient>> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    if provider == "mock" {
        tracing::info!("LLM provider set to mock, running offline");
        return None;
    }

    let deepseek = |key: &str| {
        let model = cfg.llm.model.as_deref().unwrap_or(DEEPSEEK_DEFAULT_MODEL);
        let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(OpenAiClient::new(Some(base), model, key, timeout))
    };

    match (provider.as_str(), &secrets.openai_api_key, &secrets.deepseek_api_key) {
        ("deepseek", _, Some(key)) => Some(deepseek(key)),
        (_, Some(key), _) => {
            let model = cfg.llm.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI LLM ({})", model);
            Some(Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), model, key, timeout)))
        }
        (_, None, Some(key)) => Some(deepseek(key)),
        _ => {
            tracing::warn!("No API key set, running offline (rule-based tally, no image identification)");
            None
        }
    }
}

/// 视觉分类器：需要 OpenAI 兼容的多模态端点
pub fn create_vision_from_config(cfg: &AppConfig, secrets: &Secrets) -> Arc<dyn VisionClassifier> {
    let provider = cfg.llm.provider.to_lowercase();
    match (&secrets.openai_api_key, provider.as_str()) {
        (Some(key), "openai") => {
            let model = cfg
                .llm
                .vision_model
                .as_deref()
                .or(cfg.llm.model.as_deref())
                .unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using vision model {}", model);
            let client = OpenAiClient::new(cfg.llm.base_url.as_deref(), model, key, cfg.llm.timeouts.request);
            Arc::new(OpenAiVisionClassifier::new(Arc::new(client)))
        }
        (Some(key), "deepseek") => {
            let model = cfg.llm.vision_model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI vision model {} alongside DeepSeek", model);
            let client = OpenAiClient::new(None, model, key, cfg.llm.timeouts.request);
            Arc::new(OpenAiVisionClassifier::new(Arc::new(client)))
        }
        _ => {
            tracing::warn!("No vision model configured; image turns will fail");
            Arc::new(UnconfiguredVision)
        }
    }
}

/// 进程内工具：nutrition_fetch + wiki_search
pub fn build_tool_registry(cfg: &AppConfig, secrets: &Secrets) -> ToolRegistry {
    let tools = &cfg.tools;
    let mut registry = ToolRegistry::new();
    registry.register(NutritionFetchTool::new(
        tools.nutrition.endpoint.clone(),
        NutritionCredentials {
            app_id: secrets.nutritionix_app_id.clone(),
            api_key: secrets.nutritionix_api_key.clone(),
        },
        tools.nutrition.timeout_secs,
    ));
    registry.register(WikiSearchTool::new(
        tools.wiki.endpoint.clone(),
        tools.wiki.top_k,
        tools.wiki.max_chars,
        tools.wiki.timeout_secs,
    ));
    registry
}

/// 工具来源：配置了 gateway_url 时走远端工具服务，否则用进程内工具
pub fn build_tool_source(cfg: &AppConfig, secrets: &Secrets) -> Arc<dyn ToolSource> {
    match cfg.tools.gateway_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            tracing::info!(url, "Using remote tool gateway");
            Arc::new(RemoteToolGateway::new(url, cfg.tools.tool_timeout_secs))
        }
        None => Arc::new(LocalToolSource::new(build_tool_registry(cfg, secrets))),
    }
}

/// 引擎构建器：默认按配置组装，各组件可单独替换
pub struct EngineBuilder {
    config: AppConfig,
    secrets: Secrets,
    store: Option<Arc<dyn SessionStore>>,
    vision: Option<Arc<dyn VisionClassifier>>,
    agent: Option<Arc<dyn ReasoningAgent>>,
    tools: Option<Arc<dyn ToolSource>>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig, secrets: Secrets) -> Self {
        Self {
            config,
            secrets,
            store: None,
            vision: None,
            agent: None,
            tools: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionClassifier>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_agent(mut self, agent: Arc<dyn ReasoningAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_tool_source(mut self, tools: Arc<dyn ToolSource>) -> Self {
        self.tools = Some(tools);
        self
    }

    fn build_agent(&self) -> Arc<dyn ReasoningAgent> {
        match create_llm_from_config(&self.config, &self.secrets) {
            Some(llm) => Arc::new(ReactAgent::new(llm).with_max_steps(self.config.llm.max_agent_steps)),
            None => Arc::new(TallyAgent::new()),
        }
    }

    pub fn build(self) -> WorkflowEngine {
        let timeout = self.config.tools.tool_timeout_secs;
        let agent = self.agent.clone().unwrap_or_else(|| self.build_agent());
        let vision = self
            .vision
            .clone()
            .unwrap_or_else(|| create_vision_from_config(&self.config, &self.secrets));
        let tools = self
            .tools
            .clone()
            .unwrap_or_else(|| build_tool_source(&self.config, &self.secrets));
        let store = self
            .store
            .clone()
            .unwrap_or_else(|| create_session_store(&self.config.session));

        WorkflowEngine::new(
            store,
            Arc::new(IdentifyNode::new(vision)),
            Arc::new(FetchAggregateNode::new(agent.clone(), tools.clone(), timeout)),
            Arc::new(FollowUpNode::new(agent, tools, timeout)),
        )
    }
}
