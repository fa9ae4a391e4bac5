//! Distill - 迭代式文本到 JSON 抽取智能体
//!
//! 把任意长度的非结构化文本蒸馏成单个结构化 JSON 文档：文本先做语义分块，
//! 每个 chunk 由 LLM oracle 在 Think-Act-Observe 循环中通过五个工具
//! （inspect_keys / read_value / search_pointer / apply_patches / update_guidance）
//! 对共享文档做只读侦察与原子写入，chunk 之间靠 guidance 接力棒传递上下文。
//!
//! 模块划分：
//! - **agent**: prompt 构建、oracle 回复解析、控制循环与抽取入口
//! - **chunking**: 语义分块（词频 / 嵌入打分，尺寸退路）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与运行状态
//! - **document**: JSON 文档仓库、RFC 6901 指针与 RFC 6902 补丁引擎
//! - **llm**: oracle 客户端抽象与实现（OpenAI 兼容 / 嵌入 / 脚本 Mock）
//! - **tools**: oracle 的五件套工具与带超时的执行器

pub mod agent;
pub mod chunking;
pub mod config;
pub mod core;
pub mod document;
pub mod llm;
pub mod tools;

pub use agent::Extractor;
pub use core::{AgentError, ExtractMetadata, ExtractOutput};
