//! 脚本化 Mock LLM 客户端（用于测试，无需 API）
//!
//! 按预置脚本逐条返回回复；脚本耗尽后重复最后一条（便于测试「oracle 永不收尾」
//! 时强制推进的路径）。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::Message;
use crate::llm::LlmClient;

/// 脚本化客户端：队列出队，空了就重复最后一条
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        let mut queue = self
            .responses
            .lock()
            .map_err(|_| "mock response queue poisoned".to_string())?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| "mock last-response slot poisoned".to_string())?;
        if let Some(next) = queue.pop_front() {
            *last = Some(next.clone());
            Ok(next)
        } else if let Some(repeat) = last.as_ref() {
            Ok(repeat.clone())
        } else {
            Err("mock script is empty".to_string())
        }
    }
}
