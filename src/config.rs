//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DISTILL__*` 覆盖（双下划线表示嵌套，
//! 如 `DISTILL__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub chunking: ChunkingConfig,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：OpenAI 兼容端点与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    /// 自定义 base_url（DeepSeek、本地代理等）
    pub base_url: Option<String>,
    /// 单次 oracle 调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 嵌入模型（use_embeddings 开启时的语义分块打分）
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// [chunking] 段：语义分块参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// 单段最大字符数（字节）
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// 相邻单元相似度低于该值即开新段
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// true 时用嵌入向量打分，失败退回仅按长度合并
    #[serde(default)]
    pub use_embeddings: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            similarity_threshold: default_similarity_threshold(),
            use_embeddings: false,
        }
    }
}

fn default_max_chunk_chars() -> usize {
    1200
}

fn default_similarity_threshold() -> f32 {
    0.2
}

/// [agent] 段：控制循环安全界
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 每个 chunk 的最大 think/act 轮数，超限强制推进
    #[serde(default = "default_max_iterations")]
    pub max_iterations_per_chunk: usize,
    /// oracle 超时后的重试次数，用尽后强制推进
    #[serde(default = "default_oracle_retries")]
    pub oracle_retries: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations_per_chunk: default_max_iterations(),
            oracle_retries: default_oracle_retries(),
        }
    }
}

fn default_max_iterations() -> usize {
    20
}

fn default_oracle_retries() -> usize {
    2
}

/// [tools] 段：工具超时与 read/search 截断上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// read_value：字符串截断长度
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
    /// read_value：嵌套展开最大深度
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// read_value：数组最多返回的元素数
    #[serde(default = "default_max_array_items")]
    pub max_array_items: usize,
    /// read_value：对象最多返回的键数
    #[serde(default = "default_max_object_keys")]
    pub max_object_keys: usize,
    /// search_pointer：最大命中数
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// search_pointer：命中值预览长度
    #[serde(default = "default_max_value_length")]
    pub max_value_length: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            max_string_length: default_max_string_length(),
            max_depth: default_max_depth(),
            max_array_items: default_max_array_items(),
            max_object_keys: default_max_object_keys(),
            search_limit: default_search_limit(),
            max_value_length: default_max_value_length(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_max_string_length() -> usize {
    160
}

fn default_max_depth() -> usize {
    6
}

fn default_max_array_items() -> usize {
    50
}

fn default_max_object_keys() -> usize {
    50
}

fn default_search_limit() -> usize {
    20
}

fn default_max_value_length() -> usize {
    120
}

/// 从 config 目录加载配置，环境变量 DISTILL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DISTILL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
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
        config::Environment::with_prefix("DISTILL")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder
        .build()
        .map_err(|e| AgentError::ConfigError(e.to_string()))?;
    c.try_deserialize()
        .map_err(|e| AgentError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_iterations_per_chunk, 20);
        assert_eq!(cfg.chunking.max_chunk_chars, 1200);
        assert_eq!(cfg.tools.max_string_length, 160);
        assert!(!cfg.chunking.use_embeddings);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[chunking]\nmax_chunk_chars = 99\n\n[agent]\nmax_iterations_per_chunk = 5"
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.chunking.max_chunk_chars, 99);
        assert_eq!(cfg.agent.max_iterations_per_chunk, 5);
        // 未覆盖的键保持默认
        assert_eq!(cfg.tools.search_limit, 20);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[chunking\nmax_chunk_chars = ").unwrap();

        let err = load_config(Some(path)).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }
}
