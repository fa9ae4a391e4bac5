//! inspect_keys 工具：返回指针处对象的键集、数组的长度或标量的预览
//!
//! 低成本导航手段——oracle 用它摸清文档骨架，避免整块读取。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document::DocumentStore;
use crate::tools::Tool;

/// 标量预览的最大字符数
const SCALAR_PREVIEW_CHARS: usize = 100;

pub struct InspectKeysTool {
    store: Arc<Mutex<DocumentStore>>,
}

impl InspectKeysTool {
    pub fn new(store: Arc<Mutex<DocumentStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for InspectKeysTool {
    fn name(&self) -> &str {
        "inspect_keys"
    }

    fn description(&self) -> &str {
        "Returns the keys of an object or length of an array at a specific JSON Pointer path. Args: {\"path\": \"/string\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "JSON Pointer (RFC 6901)"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let store = self
            .store
            .lock()
            .map_err(|_| "document store lock poisoned".to_string())?;

        let result = match store.get(path) {
            Err(e) => json!({"found": false, "error": e.to_string(), "path": path}),
            Ok(value) => describe(value, path),
        };
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

fn describe(value: &Value, path: &str) -> Value {
    match value {
        Value::Object(map) => {
            let keys: Vec<&String> = map.keys().collect();
            json!({
                "found": true,
                "path": path,
                "type": "object",
                "keys": keys,
                "count": keys.len(),
            })
        }
        Value::Array(items) => json!({
            "found": true,
            "path": path,
            "type": "array",
            "length": items.len(),
        }),
        other => {
            let type_name = scalar_type_name(other);
            let mut preview = match other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            };
            if preview.chars().count() > SCALAR_PREVIEW_CHARS {
                preview = format!(
                    "{}...",
                    preview.chars().take(SCALAR_PREVIEW_CHARS).collect::<String>()
                );
            }
            json!({
                "found": true,
                "path": path,
                "type": type_name,
                "value": preview,
            })
        }
    }
}

pub(crate) fn scalar_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PatchOp;

    fn store_with(doc: Value) -> Arc<Mutex<DocumentStore>> {
        let mut store = DocumentStore::new();
        let ops: Vec<PatchOp> =
            serde_json::from_value(json!([{"op": "add", "path": "", "value": doc}])).unwrap();
        store.apply(&ops).unwrap();
        Arc::new(Mutex::new(store))
    }

    #[tokio::test]
    async fn test_object_keys_in_insertion_order() {
        let tool = InspectKeysTool::new(store_with(json!({"zeta": 1, "alpha": 2, "mid": 3})));
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": ""})).await.unwrap()).unwrap();
        assert_eq!(out["type"], "object");
        assert_eq!(out["keys"], json!(["zeta", "alpha", "mid"]));
        assert_eq!(out["count"], 3);
    }

    #[tokio::test]
    async fn test_array_length() {
        let tool = InspectKeysTool::new(store_with(json!({"items": [1, 2, 3]})));
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/items"})).await.unwrap()).unwrap();
        assert_eq!(out["type"], "array");
        assert_eq!(out["length"], 3);
    }

    #[tokio::test]
    async fn test_scalar_preview() {
        let tool = InspectKeysTool::new(store_with(json!({"name": "Ana"})));
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/name"})).await.unwrap()).unwrap();
        assert_eq!(out["type"], "string");
        assert_eq!(out["value"], "Ana");
    }

    #[tokio::test]
    async fn test_missing_path_reports_not_found() {
        let tool = InspectKeysTool::new(store_with(json!({})));
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/nope"})).await.unwrap()).unwrap();
        assert_eq!(out["found"], false);
        assert!(out["error"].as_str().unwrap().contains("not found"));
    }
}
