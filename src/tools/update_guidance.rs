//! update_guidance 工具：收尾当前 chunk，产出传给下一个 chunk 的接力棒
//!
//! 必须作为单独一轮的唯一 action 调用（收尾门控由控制循环执行）；
//! 返回的 guidance 对象由控制循环取走并注入下一个 chunk 的 system prompt。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::Tool;

/// 从 args 构建 guidance 对象（缺省字段补空值）
pub fn build_guidance(args: &Value) -> Value {
    json!({
        "last_processed_path": args.get("last_processed_path").and_then(|v| v.as_str()).unwrap_or(""),
        "current_context": args.get("current_context").and_then(|v| v.as_str()).unwrap_or(""),
        "pending_action": args.get("pending_action").and_then(|v| v.as_str()).unwrap_or(""),
        "extracted_entities_count": args.get("extracted_entities_count").and_then(|v| v.as_u64()).unwrap_or(0),
    })
}

pub struct UpdateGuidanceTool;

#[async_trait]
impl Tool for UpdateGuidanceTool {
    fn name(&self) -> &str {
        "update_guidance"
    }

    fn description(&self) -> &str {
        "Finalizes the current chunk and records guidance for the next one. Must be the ONLY action in the response. Args: {\"last_processed_path\": \"/string\", \"current_context\": \"string\", \"pending_action\": \"string\", \"extracted_entities_count\": int}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "last_processed_path": {"type": "string"},
                "current_context": {"type": "string"},
                "pending_action": {"type": "string"},
                "extracted_entities_count": {"type": "integer"}
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let result = json!({
            "finalized": true,
            "guidance": build_guidance(&args),
        });
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_guidance_fills_defaults() {
        let g = build_guidance(&json!({}));
        assert_eq!(g["last_processed_path"], "");
        assert_eq!(g["extracted_entities_count"], 0);
    }

    #[tokio::test]
    async fn test_execute_wraps_guidance() {
        let out: Value = serde_json::from_str(
            &UpdateGuidanceTool
                .execute(json!({
                    "current_context": "employee list",
                    "pending_action": "expecting_contract_details",
                    "extracted_entities_count": 3
                }))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out["finalized"], true);
        assert_eq!(out["guidance"]["current_context"], "employee list");
        assert_eq!(out["guidance"]["extracted_entities_count"], 3);
    }
}
