//! Agent 错误类型
//!
//! 可恢复错误（解析失败、工具失败、oracle 超时等）在控制循环内转为 observation
//! 或触发强制推进；只有循环启动前的配置/schema 错误是致命的，整个 run 中止。

use thiserror::Error;

/// 抽取过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// oracle 回复不是合法的 {think, actions} JSON
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// oracle 请求了未注册的工具名
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 单次 oracle 调用超时（重试由控制循环负责）
    #[error("Oracle timeout after {0}s")]
    OracleTimeout(u64),

    /// 致命：启动前配置错误
    #[error("Config error: {0}")]
    ConfigError(String),

    /// 致命：target schema 不是 JSON 对象
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl AgentError {
    /// 是否可在循环内恢复（转 observation / 重试 / 强制推进）
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AgentError::ConfigError(_) | AgentError::InvalidSchema(_)
        )
    }
}
