//! LLM 客户端抽象
//!
//! oracle 是唯一不可算法化的协作方：这里只暴露「上下文 -> 一段回复」的函数形状，
//! 控制循环、指针工具与 Patch 引擎因此都能脱离真实模型做确定性测试。

use async_trait::async_trait;

use crate::core::Message;

/// LLM 客户端 trait：给定完整消息上下文，返回一条回复文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
