//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NUTRILENS__*` 覆盖（双下划线表示嵌套，如 `NUTRILENS__LLM__PROVIDER=openai`）。
//! API Key 等密钥不进配置文件，由 [`Secrets::from_env`] 在组装时读取一次。

use std::path::PathBuf;

use serde::Deserialize;

use crate::tools::{NUTRITIONIX_ENDPOINT, WIKIPEDIA_API};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub session: SessionConfig,
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；对应 Key 缺失时退回离线模式
    pub provider: String,
    /// 未设置时按后端取默认值（openai: gpt-4o-mini，deepseek: deepseek-chat）
    pub model: Option<String>,
    /// 识别图片用的模型，未设置时用 model
    pub vision_model: Option<String>,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
    /// 单次 Agent 调用的最大 ReAct 步数
    pub max_agent_steps: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            vision_model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
            max_agent_steps: crate::react::DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：工具网关地址、单次调用超时与各工具参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 远端工具服务地址（如 http://127.0.0.1:8001/mcp）；未设置时使用进程内工具
    pub gateway_url: Option<String>,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub nutrition: NutritionSection,
    pub wiki: WikiSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            gateway_url: None,
            tool_timeout_secs: 30,
            nutrition: NutritionSection::default(),
            wiki: WikiSection::default(),
        }
    }
}

/// [tools.nutrition] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NutritionSection {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for NutritionSection {
    fn default() -> Self {
        Self {
            endpoint: NUTRITIONIX_ENDPOINT.to_string(),
            timeout_secs: 15,
        }
    }
}

/// [tools.wiki] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikiSection {
    pub endpoint: String,
    pub top_k: usize,
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for WikiSection {
    fn default() -> Self {
        Self {
            endpoint: WIKIPEDIA_API.to_string(),
            top_k: 3,
            max_chars: 4000,
            timeout_secs: 15,
        }
    }
}

/// [session] 段：memory / sqlite
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: String,
    pub db_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            db_path: PathBuf::from("nutrilens_sessions.db"),
        }
    }
}

/// [server] 段：轮次 API 与工具网关的监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub tool_port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            tool_port: 8001,
        }
    }
}

impl ServerSection {
    pub fn turn_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tool_addr(&self) -> String {
        format!("{}:{}", self.host, self.tool_port)
    }
}

/// 从环境变量读取的密钥；空字符串视为未设置
#[derive(Clone, Default)]
pub struct Secrets {
    pub nutritionix_app_id: Option<String>,
    pub nutritionix_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            nutritionix_app_id: var("NUTRITIONIX_APP_ID"),
            nutritionix_api_key: var("NUTRITIONIX_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            deepseek_api_key: var("DEEPSEEK_API_KEY"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("nutritionix_app_id", &mask(&self.nutritionix_app_id))
            .field("nutritionix_api_key", &mask(&self.nutritionix_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("deepseek_api_key", &mask(&self.deepseek_api_key))
            .finish()
    }
}

/// 从 config 目录加载配置，环境变量 NUTRILENS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NUTRILENS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NUTRILENS")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
