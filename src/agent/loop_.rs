//! 单 chunk 的 Think-Act-Observe 主循环
//!
//! ChunkStart -> Thinking -> (ToolExecuting <-> Thinking)* -> ChunkAdvance。
//! oracle 调用是唯一悬挂点；每轮之间检查取消令牌。安全界：
//! - 超过 max_iterations 轮未收尾 -> 强制推进，guidance 附 diagnostic
//! - oracle 超时按「无决策」观察处理，重试 oracle_retries 次后强制推进
//! 工具级失败一律写回 observation，由 oracle 下一轮自行恢复，绝不挂起或崩溃。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::agent::parser::parse_oracle_turn;
use crate::agent::prompts::{build_observation_message, build_system_prompt, build_user_message};
use crate::chunking::Segment;
use crate::core::{AgentError, AgentState, Message};
use crate::document::DocumentStore;
use crate::llm::LlmClient;
use crate::tools::{build_guidance, ToolExecutor};

/// 单个 chunk 的处理配置与协作方
pub struct ChunkSession<'a> {
    pub oracle: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub store: &'a Arc<Mutex<DocumentStore>>,
    pub target_schema: Option<&'a Value>,
    pub cancel_token: CancellationToken,
    /// 单次 oracle 调用超时
    pub oracle_timeout: Duration,
    /// 每 chunk 最大 think/act 轮数
    pub max_iterations: usize,
    /// oracle 超时/故障的重试次数
    pub oracle_retries: usize,
}

/// chunk 处理结果
#[derive(Debug)]
pub enum ChunkOutcome {
    /// oracle 主动收尾，携带下一个 chunk 的 guidance
    Finalized(Value),
    /// 安全界触发的强制推进，guidance 已附 diagnostic
    ForcedAdvance(Value),
    /// 在轮次间检查点被取消
    Cancelled,
}

/// 处理一个 chunk：驱动 oracle 直到收尾、超限或取消
pub async fn run_chunk(
    session: &ChunkSession<'_>,
    state: &mut AgentState,
    segment: &Segment,
) -> Result<ChunkOutcome, AgentError> {
    let snapshot = {
        let mut store = session
            .store
            .lock()
            .map_err(|_| AgentError::ToolExecutionFailed("document store lock poisoned".into()))?;
        store.set_active_chunk(segment.index);
        store.snapshot()
    };

    state.current_chunk_idx = segment.index;
    let system = build_system_prompt(
        session.target_schema,
        &state.guidance,
        &snapshot,
        &session.executor.registry().to_schema_json(),
    );
    state.messages = vec![
        Message::system(system),
        Message::user(build_user_message(&segment.text, segment.index, state.total_chunks)),
    ];
    state.iteration_count = 0;

    let mut oracle_failures = 0usize;

    while state.iteration_count < session.max_iterations {
        if session.cancel_token.is_cancelled() {
            return Ok(ChunkOutcome::Cancelled);
        }

        // Thinking：唯一悬挂点
        let reply = match timeout(
            session.oracle_timeout,
            session.oracle.complete(&state.messages),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                let err = AgentError::LlmError(e);
                oracle_failures += 1;
                tracing::warn!(error = %err, attempt = oracle_failures, "oracle call failed");
                if oracle_failures > session.oracle_retries {
                    return Ok(forced_advance(
                        state,
                        segment.index,
                        format!("oracle failed after {oracle_failures} attempts: {err}"),
                    ));
                }
                push_no_decision(state, &err);
                continue;
            }
            Err(_) => {
                let err = AgentError::OracleTimeout(session.oracle_timeout.as_secs());
                oracle_failures += 1;
                tracing::warn!(error = %err, attempt = oracle_failures, "oracle call timed out");
                if oracle_failures > session.oracle_retries {
                    return Ok(forced_advance(
                        state,
                        segment.index,
                        format!("oracle timed out after {oracle_failures} attempts: {err}"),
                    ));
                }
                push_no_decision(state, &err);
                continue;
            }
        };
        state.iteration_count += 1;
        state.messages.push(Message::assistant(reply.clone()));

        let turn = match parse_oracle_turn(&reply) {
            Ok(turn) => turn,
            Err(e) => {
                // 解析失败转 observation，oracle 下一轮自行纠正
                push_observation(
                    state,
                    &[json!({"error": e.to_string(), "hint": "reply with a single JSON object matching the OutputSchema"})],
                );
                continue;
            }
        };

        if !turn.think.is_empty() {
            tracing::debug!(chunk = segment.index, think = %turn.think, "oracle thinking");
        }

        if turn.actions.is_empty() {
            push_observation(
                state,
                &[json!({"error": "No actions specified. Emit tool actions or finalize with update_guidance."})],
            );
            continue;
        }

        // 收尾门控：update_guidance 必须独占一轮；经执行器派发以留下审计日志
        if turn.is_finalization() {
            state.count_tool_call();
            let input = turn.actions[0].input.clone();
            let guidance = match session
                .executor
                .execute("update_guidance", input.clone())
                .await
            {
                Ok(raw) => serde_json::from_str::<Value>(&raw)
                    .ok()
                    .and_then(|v| v.get("guidance").cloned())
                    .unwrap_or_else(|| build_guidance(&input)),
                Err(e) => {
                    tracing::warn!(error = %e, "update_guidance dispatch failed, building guidance directly");
                    build_guidance(&input)
                }
            };
            tracing::info!(chunk = segment.index, iterations = state.iteration_count, "chunk finalized");
            return Ok(ChunkOutcome::Finalized(guidance));
        }

        // ToolExecuting：逐个派发并收集 observation
        let mut results = Vec::with_capacity(turn.actions.len());
        for request in &turn.actions {
            if session.cancel_token.is_cancelled() {
                return Ok(ChunkOutcome::Cancelled);
            }
            let result = if request.action == "update_guidance" {
                // 与其他 action 混用的收尾请求：拒绝并留在当前 chunk
                json!({"error": "update_guidance must be the ONLY action when finalizing. Other actions were present in the same response."})
            } else {
                state.count_tool_call();
                match session
                    .executor
                    .execute(&request.action, request.input.clone())
                    .await
                {
                    Ok(raw) => serde_json::from_str(&raw)
                        .unwrap_or_else(|_| Value::String(raw)),
                    Err(e) => json!({"error": e.to_string()}),
                }
            };
            results.push(json!({
                "action": request.action,
                "input": request.input,
                "result": result,
            }));
        }
        push_observation(state, &results);
    }

    Ok(forced_advance(
        state,
        segment.index,
        format!(
            "loop bound reached: {} iterations without finalization",
            session.max_iterations
        ),
    ))
}

fn push_observation(state: &mut AgentState, results: &[Value]) {
    state
        .messages
        .push(Message::user(build_observation_message(results)));
}

/// 超时/故障轮记为「无决策」观察，oracle 重试时能看到这一空转
fn push_no_decision(state: &mut AgentState, err: &AgentError) {
    push_observation(
        state,
        &[json!({
            "error": format!("no decision this turn: {err}"),
            "hint": "reply with a single JSON object matching the OutputSchema",
        })],
    );
}

/// 强制推进：保留既有 guidance，附加 diagnostic 说明降级原因
fn forced_advance(state: &AgentState, chunk_index: usize, diagnostic: String) -> ChunkOutcome {
    tracing::warn!(chunk = chunk_index, diagnostic = %diagnostic, "forced chunk advance");
    let mut guidance = state.guidance.clone();
    if let Some(map) = guidance.as_object_mut() {
        map.insert(
            "diagnostic".to_string(),
            Value::String(format!("chunk {chunk_index}: {diagnostic}")),
        );
    } else {
        guidance = json!({
            "diagnostic": format!("chunk {chunk_index}: {diagnostic}"),
        });
    }
    ChunkOutcome::ForcedAdvance(guidance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsSection;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::build_registry;

    fn session_parts(
        script: Vec<&str>,
    ) -> (
        ScriptedLlmClient,
        ToolExecutor,
        Arc<Mutex<DocumentStore>>,
    ) {
        let store = Arc::new(Mutex::new(DocumentStore::new()));
        let registry = build_registry(store.clone(), &ToolsSection::default());
        let executor = ToolExecutor::new(registry, 5);
        (ScriptedLlmClient::new(script), executor, store)
    }

    fn segment(text: &str) -> Segment {
        Segment {
            index: 0,
            text: text.to_string(),
            start: 0,
            end: text.len(),
        }
    }

    fn session<'a>(
        oracle: &'a ScriptedLlmClient,
        executor: &'a ToolExecutor,
        store: &'a Arc<Mutex<DocumentStore>>,
    ) -> ChunkSession<'a> {
        ChunkSession {
            oracle,
            executor,
            store,
            target_schema: None,
            cancel_token: CancellationToken::new(),
            oracle_timeout: Duration::from_secs(5),
            max_iterations: 6,
            oracle_retries: 1,
        }
    }

    #[tokio::test]
    async fn test_patch_then_finalize() {
        let (oracle, executor, store) = session_parts(vec![
            r#"{"think": "write", "actions": [{"action": "apply_patches", "input": {"patches": [{"op": "add", "path": "/age", "value": 29}]}}]}"#,
            r#"{"think": "done", "actions": [{"action": "update_guidance", "input": {"current_context": "person record"}}]}"#,
        ]);
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("age 29")).await.unwrap();

        match outcome {
            ChunkOutcome::Finalized(guidance) => {
                assert_eq!(guidance["current_context"], "person record");
            }
            other => panic!("expected finalization, got {other:?}"),
        }
        assert_eq!(store.lock().unwrap().snapshot(), json!({"age": 29}));
        assert_eq!(state.tool_calls_per_chunk[0], 2);
    }

    #[tokio::test]
    async fn test_loop_bound_forces_advance() {
        // oracle 永远只做 recon，耗尽脚本后重复最后一条
        let (oracle, executor, store) = session_parts(vec![
            r#"{"think": "look", "actions": [{"action": "inspect_keys", "input": {"path": ""}}]}"#,
        ]);
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        match outcome {
            ChunkOutcome::ForcedAdvance(guidance) => {
                let diag = guidance["diagnostic"].as_str().unwrap();
                assert!(diag.contains("loop bound"));
            }
            other => panic!("expected forced advance, got {other:?}"),
        }
        assert_eq!(state.iteration_count, 6);
    }

    #[tokio::test]
    async fn test_unknown_tool_surfaces_as_observation() {
        let (oracle, executor, store) = session_parts(vec![
            r#"{"think": "", "actions": [{"action": "delete_everything", "input": {}}]}"#,
            r#"{"think": "ok", "actions": [{"action": "update_guidance", "input": {}}]}"#,
        ]);
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        assert!(matches!(outcome, ChunkOutcome::Finalized(_)));
        // 未知工具的错误进入了 observation 消息
        let observations: Vec<&Message> = state
            .messages
            .iter()
            .filter(|m| m.content.contains("ToolObservations"))
            .collect();
        assert!(observations
            .iter()
            .any(|m| m.content.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn test_misplaced_finalization_rejected() {
        let (oracle, executor, store) = session_parts(vec![
            r#"{"think": "", "actions": [
                {"action": "apply_patches", "input": {"patches": [{"op": "add", "path": "/a", "value": 1}]}},
                {"action": "update_guidance", "input": {}}
            ]}"#,
            r#"{"think": "", "actions": [{"action": "update_guidance", "input": {}}]}"#,
        ]);
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        assert!(matches!(outcome, ChunkOutcome::Finalized(_)));
        // 混用轮的 patch 仍然执行了，但收尾被拒绝、推迟到下一轮
        assert_eq!(store.lock().unwrap().snapshot(), json!({"a": 1}));
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("must be the ONLY action")));
    }

    #[tokio::test]
    async fn test_malformed_reply_recovers() {
        let (oracle, executor, store) = session_parts(vec![
            "I will now extract the data.",
            r#"{"think": "", "actions": [{"action": "update_guidance", "input": {}}]}"#,
        ]);
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();
        assert!(matches!(outcome, ChunkOutcome::Finalized(_)));
    }

    #[tokio::test]
    async fn test_oracle_failure_forces_advance() {
        // 空脚本的 mock 每次 complete 都报错，重试耗尽后强制推进
        let (oracle, executor, store) = session_parts(Vec::<&str>::new());
        let sess = session(&oracle, &executor, &store);
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        match outcome {
            ChunkOutcome::ForcedAdvance(guidance) => {
                let diag = guidance["diagnostic"].as_str().unwrap();
                assert!(diag.contains("oracle failed"));
                assert!(diag.contains("LLM error"));
            }
            other => panic!("expected forced advance, got {other:?}"),
        }
        // 从未得到可用回复，没有消耗任何 think/act 轮
        assert_eq!(state.iteration_count, 0);
        assert_eq!(store.lock().unwrap().snapshot(), json!({}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_timeout_forces_advance() {
        struct StallingClient;

        #[async_trait::async_trait]
        impl crate::llm::LlmClient for StallingClient {
            async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }

        let store = Arc::new(Mutex::new(DocumentStore::new()));
        let registry = crate::tools::build_registry(store.clone(), &ToolsSection::default());
        let executor = ToolExecutor::new(registry, 5);
        let oracle = StallingClient;
        let sess = ChunkSession {
            oracle: &oracle,
            executor: &executor,
            store: &store,
            target_schema: None,
            cancel_token: CancellationToken::new(),
            oracle_timeout: Duration::from_secs(1),
            max_iterations: 6,
            oracle_retries: 1,
        };
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        match outcome {
            ChunkOutcome::ForcedAdvance(guidance) => {
                let diag = guidance["diagnostic"].as_str().unwrap();
                assert!(diag.contains("timed out"));
            }
            other => panic!("expected forced advance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_decision_observation_between_retries() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct FailingOnceClient {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl crate::llm::LlmClient for FailingOnceClient {
            async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("connection reset".to_string())
                } else {
                    Ok(r#"{"think": "", "actions": [{"action": "update_guidance", "input": {}}]}"#
                        .to_string())
                }
            }
        }

        let store = Arc::new(Mutex::new(DocumentStore::new()));
        let registry = crate::tools::build_registry(store.clone(), &ToolsSection::default());
        let executor = ToolExecutor::new(registry, 5);
        let oracle = FailingOnceClient {
            calls: AtomicUsize::new(0),
        };
        let sess = ChunkSession {
            oracle: &oracle,
            executor: &executor,
            store: &store,
            target_schema: None,
            cancel_token: CancellationToken::new(),
            oracle_timeout: Duration::from_secs(5),
            max_iterations: 6,
            oracle_retries: 2,
        };
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();

        assert!(matches!(outcome, ChunkOutcome::Finalized(_)));
        // 失败轮在对话中留下「无决策」观察，重试时 oracle 能看到空转
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("no decision this turn")));
    }

    #[tokio::test]
    async fn test_cancellation_checkpoint() {
        let (oracle, executor, store) = session_parts(vec![
            r#"{"think": "", "actions": [{"action": "inspect_keys", "input": {"path": ""}}]}"#,
        ]);
        let mut sess = session(&oracle, &executor, &store);
        let token = CancellationToken::new();
        token.cancel();
        sess.cancel_token = token;
        let mut state = AgentState::new(1);
        let outcome = run_chunk(&sess, &mut state, &segment("text")).await.unwrap();
        assert!(matches!(outcome, ChunkOutcome::Cancelled));
    }
}
