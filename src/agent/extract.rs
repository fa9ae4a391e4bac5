//! 抽取入口：分块 -> 逐 chunk 驱动控制循环 -> 汇总输出
//!
//! Extractor 持有 oracle 客户端与配置，对一次 extract 调用：
//! 1. 校验 target schema（若提供必须是 JSON object，否则致命错误）
//! 2. 语义分块（可选 embedding 打分，失败回退纯尺寸分块）
//! 3. 建 DocumentStore + 工具注册表 + 执行器，逐 chunk 运行 run_chunk
//! 4. 返回最终文档 + 元数据；取消只中断 chunk 边界之间，已完成的保留

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::loop_::{run_chunk, ChunkOutcome, ChunkSession};
use crate::chunking::{
    chunk_with_fallback, EmbeddingScorer, LexicalScorer, Segment, SimilarityScorer,
};
use crate::config::AppConfig;
use crate::core::{AgentError, AgentState, ExtractMetadata, ExtractOutput};
use crate::document::DocumentStore;
use crate::llm::{create_embedder_from_config, LlmClient};
use crate::tools::{build_registry, ToolExecutor};

/// 文本到 JSON 的抽取器
pub struct Extractor {
    oracle: Arc<dyn LlmClient>,
    config: AppConfig,
}

impl Extractor {
    pub fn new(config: AppConfig, oracle: Arc<dyn LlmClient>) -> Self {
        Self { oracle, config }
    }

    /// 运行一次完整抽取
    pub async fn extract(
        &self,
        text: &str,
        target_schema: Option<Value>,
    ) -> Result<ExtractOutput, AgentError> {
        self.extract_with_cancel(text, target_schema, CancellationToken::new())
            .await
    }

    /// 带取消令牌的抽取；取消在 chunk 边界与轮次间生效，已完成的 chunk 保留
    pub async fn extract_with_cancel(
        &self,
        text: &str,
        target_schema: Option<Value>,
        cancel_token: CancellationToken,
    ) -> Result<ExtractOutput, AgentError> {
        if let Some(schema) = &target_schema {
            if !schema.is_object() {
                return Err(AgentError::InvalidSchema(
                    "target schema must be a JSON object".to_string(),
                ));
            }
        }

        let segments = self.segment(text);
        let total_chunks = segments.len();
        tracing::info!(total_chunks, input_chars = text.len(), "extraction started");

        let store = Arc::new(Mutex::new(DocumentStore::new()));
        let registry = build_registry(store.clone(), &self.config.tools);
        let executor = ToolExecutor::new(registry, self.config.tools.tool_timeout_secs);

        let mut state = AgentState::new(total_chunks);
        let mut run_error: Option<String> = None;

        for segment in &segments {
            if cancel_token.is_cancelled() {
                run_error = Some(format!(
                    "cancelled after {} of {} chunks",
                    state.chunks_processed, total_chunks
                ));
                break;
            }
            let session = ChunkSession {
                oracle: self.oracle.as_ref(),
                executor: &executor,
                store: &store,
                target_schema: target_schema.as_ref(),
                cancel_token: cancel_token.clone(),
                oracle_timeout: Duration::from_secs(self.config.llm.request_timeout_secs),
                max_iterations: self.config.agent.max_iterations_per_chunk,
                oracle_retries: self.config.agent.oracle_retries,
            };
            match run_chunk(&session, &mut state, segment).await? {
                ChunkOutcome::Finalized(guidance) | ChunkOutcome::ForcedAdvance(guidance) => {
                    state.guidance = guidance;
                    state.chunks_processed += 1;
                }
                ChunkOutcome::Cancelled => {
                    run_error = Some(format!(
                        "cancelled after {} of {} chunks",
                        state.chunks_processed, total_chunks
                    ));
                    break;
                }
            }
        }

        let json_document = store
            .lock()
            .map_err(|_| AgentError::ToolExecutionFailed("document store lock poisoned".into()))?
            .snapshot();
        tracing::info!(
            chunks_processed = state.chunks_processed,
            total_chunks,
            "extraction finished"
        );

        Ok(ExtractOutput {
            json_document,
            metadata: ExtractMetadata {
                total_chunks,
                chunks_processed: state.chunks_processed,
                tool_calls_per_chunk: state.tool_calls_per_chunk,
                final_guidance: state.guidance,
            },
            error: run_error,
        })
    }

    /// 分块：按配置选择打分器，打分器故障时回退纯尺寸切分
    fn segment(&self, text: &str) -> Vec<Segment> {
        let scorer: Box<dyn SimilarityScorer> = if self.config.chunking.use_embeddings {
            match create_embedder_from_config(
                self.config.llm.base_url.as_deref(),
                &self.config.llm.embedding_model,
                None,
            ) {
                Some(embedder) => Box::new(EmbeddingScorer::new(embedder)),
                None => {
                    tracing::warn!("embedding provider unavailable, using lexical scorer");
                    Box::new(LexicalScorer)
                }
            }
        } else {
            Box::new(LexicalScorer)
        };
        chunk_with_fallback(text, &self.config.chunking, scorer.as_ref())
    }
}
