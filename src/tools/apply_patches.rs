//! apply_patches 工具：整批原子应用 RFC 6902 操作
//!
//! 失败整批拒绝并回报 failed_at_index，文档保持不变；
//! 工具级失败（坏路径、类型不符、test 不通过）是 observation，不是进程错误。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document::{DocumentStore, PatchOp};
use crate::tools::Tool;

pub struct ApplyPatchesTool {
    store: Arc<Mutex<DocumentStore>>,
}

impl ApplyPatchesTool {
    pub fn new(store: Arc<Mutex<DocumentStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ApplyPatchesTool {
    fn name(&self) -> &str {
        "apply_patches"
    }

    fn description(&self) -> &str {
        "Applies a batch of RFC 6902 JSON Patch operations (add/remove/replace/move/copy/test) atomically. Args: {\"patches\": [{\"op\": \"add\", \"path\": \"/x\", \"value\": 1}]}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patches": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "op": {"type": "string", "enum": ["add", "remove", "replace", "move", "copy", "test"]},
                            "path": {"type": "string"},
                            "value": {},
                            "from": {"type": "string"}
                        },
                        "required": ["op", "path"]
                    }
                }
            },
            "required": ["patches"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let Some(raw_patches) = args.get("patches").and_then(|v| v.as_array()) else {
            return to_json(&json!({
                "success": false,
                "error": "missing 'patches' array in arguments",
            }));
        };

        if raw_patches.is_empty() {
            return to_json(&json!({
                "success": true,
                "applied_count": 0,
                "message": "No patches to apply",
            }));
        }

        // 逐条反序列化：第一条不合法的操作即整批拒绝，并指出下标
        let mut ops: Vec<PatchOp> = Vec::with_capacity(raw_patches.len());
        for (i, raw) in raw_patches.iter().enumerate() {
            match serde_json::from_value::<PatchOp>(raw.clone()) {
                Ok(op) => ops.push(op),
                Err(e) => {
                    return to_json(&json!({
                        "success": false,
                        "error": format!("Invalid operation at index {i}: {e}"),
                        "failed_at_index": i,
                    }));
                }
            }
        }

        let mut store = self
            .store
            .lock()
            .map_err(|_| "document store lock poisoned".to_string())?;

        match store.apply(&ops) {
            Ok(applied) => to_json(&json!({
                "success": true,
                "applied_count": applied,
            })),
            Err(e) => to_json(&json!({
                "success": false,
                "error": e.to_string(),
                "failed_at_index": e.index,
            })),
        }
    }
}

fn to_json(value: &Value) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_and_store() -> (ApplyPatchesTool, Arc<Mutex<DocumentStore>>) {
        let store = Arc::new(Mutex::new(DocumentStore::new()));
        (ApplyPatchesTool::new(store.clone()), store)
    }

    async fn run(tool: &ApplyPatchesTool, args: Value) -> Value {
        serde_json::from_str(&tool.execute(args).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_successful_batch() {
        let (tool, store) = tool_and_store();
        let out = run(
            &tool,
            json!({"patches": [
                {"op": "add", "path": "/name", "value": "John Doe"},
                {"op": "add", "path": "/age", "value": 30}
            ]}),
        )
        .await;
        assert_eq!(out["success"], true);
        assert_eq!(out["applied_count"], 2);
        assert_eq!(
            store.lock().unwrap().snapshot(),
            json!({"name": "John Doe", "age": 30})
        );
    }

    #[tokio::test]
    async fn test_failure_reports_index_and_leaves_document() {
        let (tool, store) = tool_and_store();
        let out = run(
            &tool,
            json!({"patches": [
                {"op": "add", "path": "/a", "value": 1},
                {"op": "replace", "path": "/missing", "value": 2}
            ]}),
        )
        .await;
        assert_eq!(out["success"], false);
        assert_eq!(out["failed_at_index"], 1);
        assert_eq!(store.lock().unwrap().snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_unknown_op_rejected_with_index() {
        let (tool, _) = tool_and_store();
        let out = run(
            &tool,
            json!({"patches": [{"op": "merge", "path": "/a", "value": 1}]}),
        )
        .await;
        assert_eq!(out["success"], false);
        assert_eq!(out["failed_at_index"], 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (tool, _) = tool_and_store();
        let out = run(&tool, json!({"patches": []})).await;
        assert_eq!(out["success"], true);
        assert_eq!(out["applied_count"], 0);
    }
}
