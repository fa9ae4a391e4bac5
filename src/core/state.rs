//! 运行状态：对话消息、AgentState 与最终输出
//!
//! AgentState 在 chunk 0 之前创建，由控制循环原地推进；文档本身在 DocumentStore，
//! 这里只保存 guidance、计数器与当前 chunk 的对话历史。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 跨 chunk 推进的运行状态
#[derive(Debug)]
pub struct AgentState {
    /// 上个 chunk 留给当前 chunk 的接力棒（JSON 对象）
    pub guidance: Value,
    pub current_chunk_idx: usize,
    pub total_chunks: usize,
    /// 实际完成（含强制推进）的 chunk 数
    pub chunks_processed: usize,
    /// 当前 chunk 内已消耗的 think/act 轮数
    pub iteration_count: usize,
    /// 当前 chunk 的对话历史（system + user + 轮次 observation）
    pub messages: Vec<Message>,
    /// 每个 chunk 的工具调用计数
    pub tool_calls_per_chunk: Vec<usize>,
}

impl AgentState {
    pub fn new(total_chunks: usize) -> Self {
        Self {
            guidance: Value::Object(serde_json::Map::new()),
            current_chunk_idx: 0,
            total_chunks,
            chunks_processed: 0,
            iteration_count: 0,
            messages: Vec::new(),
            tool_calls_per_chunk: vec![0; total_chunks],
        }
    }

    /// 记录一次工具调用（归入当前 chunk）
    pub fn count_tool_call(&mut self) {
        if let Some(n) = self.tool_calls_per_chunk.get_mut(self.current_chunk_idx) {
            *n += 1;
        }
    }
}

/// 抽取元数据（随最终文档一起返回）
#[derive(Debug, Clone, Serialize)]
pub struct ExtractMetadata {
    pub total_chunks: usize,
    pub chunks_processed: usize,
    pub tool_calls_per_chunk: Vec<usize>,
    pub final_guidance: Value,
}

/// 抽取结果：最终文档 + 元数据 + 可选错误
#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutput {
    pub json_document: Value,
    pub metadata: ExtractMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
