//! 语义分块器
//!
//! 文本先按句末标点切成原子单元（精确子串，不丢字符），相邻单元做话题相似度打分，
//! 相似度高于阈值且累计长度未超上限时并入同段，否则开新段；单个超长单元自成一段。
//! 打分器是可插拔 trait：默认词频余弦（纯函数，结果可复现），可选嵌入向量打分；
//! 嵌入不可用时 chunk_with_fallback 退回仅按长度合并。

use regex::Regex;
use std::collections::HashMap;

use crate::chunking::Segment;
use crate::config::ChunkingConfig;

/// 相邻单元的话题相似度打分器（0.0 ~ 1.0）
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, left: &str, right: &str) -> Result<f32, String>;
}

/// 默认打分器：小写词频向量的余弦相似度；纯函数，同输入必同输出
#[derive(Debug, Default)]
pub struct LexicalScorer;

impl SimilarityScorer for LexicalScorer {
    fn score(&self, left: &str, right: &str) -> Result<f32, String> {
        Ok(cosine(&word_freq(left), &word_freq(right)))
    }
}

fn word_freq(text: &str) -> HashMap<String, f32> {
    let mut freq = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *freq.entry(word.to_lowercase()).or_insert(0.0) += 1.0;
    }
    freq
}

fn cosine(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .filter_map(|(k, v)| b.get(k).map(|w| v * w))
        .sum();
    let norm_a: f32 = a.values().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// 基于嵌入向量的余弦相似度打分（供语义分块可选启用）
pub struct EmbeddingScorer<E> {
    provider: E,
}

impl<E> EmbeddingScorer<E> {
    pub fn new(provider: E) -> Self {
        Self { provider }
    }
}

impl<E: crate::llm::EmbeddingProvider> SimilarityScorer for EmbeddingScorer<E> {
    fn score(&self, left: &str, right: &str) -> Result<f32, String> {
        let a = self.provider.embed_sync(left)?;
        let b = self.provider.embed_sync(right)?;
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            Ok(0.0)
        } else {
            Ok(dot / (na * nb))
        }
    }
}

/// 语义分块器：持有配置，chunk 为一次性计算（不可重启，无内部状态）
pub struct SemanticChunker<'a> {
    config: &'a ChunkingConfig,
}

impl<'a> SemanticChunker<'a> {
    pub fn new(config: &'a ChunkingConfig) -> Self {
        Self { config }
    }

    /// 切分文本：空输入得空序列；段文本按序拼接严格等于原文
    pub fn chunk(&self, text: &str, scorer: &dyn SimilarityScorer) -> Result<Vec<Segment>, String> {
        let units = split_units(text);
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let max_chars = self.config.max_chunk_chars;
        let threshold = self.config.similarity_threshold;

        let mut segments: Vec<Segment> = Vec::new();
        // 当前段在原文中的字节范围
        let mut seg_start = units[0].0;
        let mut seg_end = units[0].1;

        for window in units.windows(2) {
            let (prev_start, prev_end) = window[0];
            let (next_start, next_end) = window[1];
            let similarity = scorer.score(&text[prev_start..prev_end], &text[next_start..next_end])?;
            let would_be = next_end - seg_start;

            if similarity < threshold || would_be > max_chars {
                segments.push(make_segment(text, segments.len(), seg_start, seg_end));
                seg_start = next_start;
            }
            seg_end = next_end;
        }
        segments.push(make_segment(text, segments.len(), seg_start, seg_end));
        Ok(segments)
    }
}

/// 仅按长度合并的退路切分（不打分）：嵌入端点不可用时保证仍能分块
pub fn size_only_chunks(text: &str, max_chars: usize) -> Vec<Segment> {
    let units = split_units(text);
    if units.is_empty() {
        return Vec::new();
    }
    let mut segments: Vec<Segment> = Vec::new();
    let mut seg_start = units[0].0;
    let mut seg_end = units[0].1;
    for &(start, end) in &units[1..] {
        if end - seg_start > max_chars {
            segments.push(make_segment(text, segments.len(), seg_start, seg_end));
            seg_start = start;
        }
        seg_end = end;
    }
    segments.push(make_segment(text, segments.len(), seg_start, seg_end));
    segments
}

/// 语义分块，打分器失败时退回仅按长度合并
pub fn chunk_with_fallback(
    text: &str,
    config: &ChunkingConfig,
    scorer: &dyn SimilarityScorer,
) -> Vec<Segment> {
    match SemanticChunker::new(config).chunk(text, scorer) {
        Ok(segments) => segments,
        Err(e) => {
            tracing::warn!(error = %e, "semantic chunking failed, falling back to size-only merge");
            size_only_chunks(text, config.max_chunk_chars)
        }
    }
}

fn make_segment(text: &str, index: usize, start: usize, end: usize) -> Segment {
    Segment {
        index,
        text: text[start..end].to_string(),
        start,
        end,
    }
}

/// 把文本切成句级原子单元的字节区间，区间首尾相接覆盖全文
///
/// 边界：句末标点（含中文标点）后跟空白，或空行。标点与其后空白归属前一单元。
fn split_units(text: &str) -> Vec<(usize, usize)> {
    if text.is_empty() {
        return Vec::new();
    }
    // 每次编译正则代价可忽略（chunk 每个 run 只调用一次）
    let boundary = Regex::new(r"(?:[.!?。！？][\s]+)|(?:\n{2,})").unwrap();

    let mut units = Vec::new();
    let mut last = 0usize;
    for m in boundary.find_iter(text) {
        if m.end() < text.len() {
            units.push((last, m.end()));
            last = m.end();
        }
    }
    if last < text.len() {
        units.push((last, text.len()));
    }
    units
}
