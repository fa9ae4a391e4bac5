//! 分块层：把原始文本切成有序的语义连贯段

pub mod semantic;

use serde::Serialize;

/// 一个文本段：由 Chunker 一次性产出，之后不可变，按序被控制循环消费
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Segment {
    /// 段序号，从 0 起连续
    pub index: usize,
    /// 段文本（原文的精确子串，按序拼接可还原全文）
    pub text: String,
    /// 原文中的字节起止（边界元数据）
    pub start: usize,
    pub end: usize,
}

pub use semantic::{
    chunk_with_fallback, EmbeddingScorer, LexicalScorer, SemanticChunker, SimilarityScorer,
};
