//! Prompt 构建：system（角色 + 工具目录 + 输入上下文）、user（chunk 文本）、observation
//!
//! system prompt 每个 chunk 重建一次，注入 target schema、上一个 chunk 的 guidance
//! 与当前文档骨架；工具目录从注册表动态生成，保证与实际注册的工具一致。

use serde_json::Value;

/// 构建 system prompt；tool_catalog 为注册表导出的工具目录 JSON
pub fn build_system_prompt(
    target_schema: Option<&Value>,
    previous_guidance: &Value,
    json_skeleton: &Value,
    tool_catalog: &str,
) -> String {
    let schema_str = target_schema
        .map(|s| serde_json::to_string_pretty(s).unwrap_or_else(|_| "null".to_string()))
        .unwrap_or_else(|| "null".to_string());
    let guidance_str = if previous_guidance.as_object().map(|m| m.is_empty()).unwrap_or(false) {
        "null".to_string()
    } else {
        serde_json::to_string_pretty(previous_guidance).unwrap_or_else(|_| "null".to_string())
    };
    let skeleton_str =
        serde_json::to_string_pretty(json_skeleton).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"<SystemPrompt>
    <RoleDefinition>
        You are a Sequential Data Architect extracting structured data from unstructured text chunks into a single JSON Document.
        You operate within an iterative Think-Act-Observe loop. You process a large document chunk-by-chunk; you see only the current TextChunk plus the tool observations made for it.
        You may need multiple iterations (tools -> observe -> tools) to fully process the SAME TextChunk. Bundle independent actions together whenever safe.
    </RoleDefinition>

    <PrimaryObjectives>
        1. Extraction: capture meaningful data from the TextChunk.
        2. Structural Integrity: adhere to the TargetSchema (if provided); otherwise infer a logical, consistent structure from the JsonSkeleton.
        3. State Continuity: read the Guidance object first to know what the previous chunk was doing.
        4. Efficiency: use inspection tools instead of reading large subtrees; prefer lengths and targeted indices.
        5. Safe Finalization: never advance to the next chunk until all writes for the current chunk are confirmed.
    </PrimaryObjectives>

    <OperationalConstraints>
        - Output a single JSON object. No Markdown fences, no preamble, no postscript.
        - Never guess a path. Use inspect_keys or search_pointer before writing into arrays or deep objects, to avoid overwriting or duplicating data.
        - Do not emit an action that depends on IDs/indices/paths you have not yet observed; emit the recon actions first and the dependent writes next iteration.
        - FINALIZATION GATE: if actions contains update_guidance it MUST be the only action in the list, in a dedicated final response.
        - If a previous apply_patches for this chunk failed, do NOT finalize; correct the issue first.
        - The document is a living draft: when the current chunk clarifies or contradicts earlier data, use replace/remove/move to correct it instead of duplicating. Verify with read_value before correcting.
    </OperationalConstraints>

    <ToolCatalog>
{tool_catalog}
    </ToolCatalog>

    <OutputSchema>
        {{
            "type": "object",
            "required": ["think", "actions"],
            "properties": {{
                "think": {{"type": "string"}},
                "actions": {{
                    "type": "array",
                    "items": {{
                        "type": "object",
                        "required": ["action", "input"],
                        "properties": {{
                            "action": {{"type": "string", "enum": ["inspect_keys", "read_value", "search_pointer", "apply_patches", "update_guidance"]}},
                            "input": {{"type": "object"}}
                        }}
                    }}
                }}
            }}
        }}
    </OutputSchema>

    <InputContext>
        <TargetSchema>
{schema_str}
        </TargetSchema>

        <PreviousGuidance>
{guidance_str}
        </PreviousGuidance>

        <JsonSkeleton>
{skeleton_str}
        </JsonSkeleton>
    </InputContext>
</SystemPrompt>"#
    )
}

/// 构建 user 消息：当前 chunk 文本与进度（序号从 1 显示）
pub fn build_user_message(text_chunk: &str, chunk_index: usize, total_chunks: usize) -> String {
    format!(
        "<TextChunk index=\"{}\" total=\"{}\">\n{}\n</TextChunk>",
        chunk_index + 1,
        total_chunks,
        text_chunk
    )
}

/// 构建 observation 消息：上一轮全部工具结果的 JSON 数组
pub fn build_observation_message(actions_results: &[Value]) -> String {
    let results_str = serde_json::to_string_pretty(actions_results)
        .unwrap_or_else(|_| "[]".to_string());
    format!("<ToolObservations>\n{results_str}\n</ToolObservations>")
}
