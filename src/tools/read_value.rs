//! read_value 工具：按指针读取值，带确定性截断
//!
//! 截断规则（只截断，不摘要，保证可复现）：
//! - 字符串超长：保留前缀并追加 "... (N chars total)" 标记
//! - 超过最大深度：对象/数组折叠为 "{...} (N keys)" / "[...] (N items)"
//! - 对象键数超限：保留前 N 键并加 "__truncated__" 键
//! - 数组元素超限：保留前 N 项并追加 "... (N more items)" 标记

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::ToolsSection;
use crate::document::DocumentStore;
use crate::tools::inspect_keys::scalar_type_name;
use crate::tools::Tool;

/// 截断上限（默认取自 [tools] 配置，单次调用可在 args 里覆盖）
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub max_string_length: usize,
    pub max_depth: usize,
    pub max_array_items: usize,
    pub max_object_keys: usize,
}

impl ReadLimits {
    pub fn from_config(cfg: &ToolsSection) -> Self {
        Self {
            max_string_length: cfg.max_string_length,
            max_depth: cfg.max_depth,
            max_array_items: cfg.max_array_items,
            max_object_keys: cfg.max_object_keys,
        }
    }
}

pub struct ReadValueTool {
    store: Arc<Mutex<DocumentStore>>,
    defaults: ReadLimits,
}

impl ReadValueTool {
    pub fn new(store: Arc<Mutex<DocumentStore>>, defaults: ReadLimits) -> Self {
        Self { store, defaults }
    }

    fn limits_from(&self, args: &Value) -> ReadLimits {
        let pick = |key: &str, default: usize| {
            args.get(key)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(default)
        };
        ReadLimits {
            max_string_length: pick("max_string_length", self.defaults.max_string_length),
            max_depth: pick("max_depth", self.defaults.max_depth),
            max_array_items: pick("max_array_items", self.defaults.max_array_items),
            max_object_keys: pick("max_object_keys", self.defaults.max_object_keys),
        }
    }
}

#[async_trait]
impl Tool for ReadValueTool {
    fn name(&self) -> &str {
        "read_value"
    }

    fn description(&self) -> &str {
        "Retrieves the value at a specific JSON Pointer path, truncated deterministically. Args: {\"path\": \"/string\", \"max_string_length\"?: int}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "JSON Pointer (RFC 6901)"},
                "max_string_length": {"type": "integer"},
                "max_depth": {"type": "integer"},
                "max_array_items": {"type": "integer"},
                "max_object_keys": {"type": "integer"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let limits = self.limits_from(&args);
        let store = self
            .store
            .lock()
            .map_err(|_| "document store lock poisoned".to_string())?;

        let result = match store.get(path) {
            Err(e) => json!({"found": false, "error": e.to_string(), "path": path}),
            Ok(value) => json!({
                "found": true,
                "path": path,
                "value": truncate_value(value, &limits, 0),
                "type": scalar_type_name(value),
            }),
        };
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

fn truncate_string(s: &str, max_len: usize) -> Value {
    let total = s.chars().count();
    if total > max_len {
        Value::String(format!(
            "{}... ({} chars total)",
            s.chars().take(max_len).collect::<String>(),
            total
        ))
    } else {
        Value::String(s.to_string())
    }
}

fn truncate_value(value: &Value, limits: &ReadLimits, depth: usize) -> Value {
    if depth >= limits.max_depth {
        return match value {
            Value::Object(map) => Value::String(format!("{{...}} ({} keys)", map.len())),
            Value::Array(items) => Value::String(format!("[...] ({} items)", items.len())),
            Value::String(s) => truncate_string(s, limits.max_string_length),
            other => other.clone(),
        };
    }

    match value {
        Value::String(s) => truncate_string(s, limits.max_string_length),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map.iter().take(limits.max_object_keys) {
                out.insert(k.clone(), truncate_value(v, limits, depth + 1));
            }
            if map.len() > limits.max_object_keys {
                out.insert(
                    "__truncated__".to_string(),
                    Value::String(format!("{} more keys", map.len() - limits.max_object_keys)),
                );
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_array_items)
                .map(|item| truncate_value(item, limits, depth + 1))
                .collect();
            if items.len() > limits.max_array_items {
                out.push(Value::String(format!(
                    "... ({} more items)",
                    items.len() - limits.max_array_items
                )));
            }
            Value::Array(out)
        }
        other => other.clone(),
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

    fn limits() -> ReadLimits {
        ReadLimits {
            max_string_length: 10,
            max_depth: 3,
            max_array_items: 2,
            max_object_keys: 2,
        }
    }

    #[tokio::test]
    async fn test_read_exact_value() {
        let tool = ReadValueTool::new(store_with(json!({"age": 30})), limits());
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/age"})).await.unwrap()).unwrap();
        assert_eq!(out["found"], true);
        assert_eq!(out["value"], 30);
        assert_eq!(out["type"], "number");
    }

    #[tokio::test]
    async fn test_string_truncation_marker() {
        let tool = ReadValueTool::new(
            store_with(json!({"bio": "a very long biography text"})),
            limits(),
        );
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/bio"})).await.unwrap()).unwrap();
        let s = out["value"].as_str().unwrap();
        assert!(s.starts_with("a very lon"));
        assert!(s.ends_with("(26 chars total)"));
    }

    #[tokio::test]
    async fn test_array_and_object_caps() {
        let tool = ReadValueTool::new(
            store_with(json!({"xs": [1, 2, 3, 4], "a": 1, "b": 2, "c": 3})),
            limits(),
        );
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/xs"})).await.unwrap()).unwrap();
        assert_eq!(out["value"], json!([1, 2, "... (2 more items)"]));

        let root: Value =
            serde_json::from_str(&tool.execute(json!({"path": ""})).await.unwrap()).unwrap();
        assert_eq!(root["value"]["__truncated__"], "2 more keys");
    }

    #[tokio::test]
    async fn test_depth_cap_collapses() {
        let tool = ReadValueTool::new(
            store_with(json!({"a": {"b": {"c": {"d": 1, "e": 2}}}})),
            limits(),
        );
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": ""})).await.unwrap()).unwrap();
        assert_eq!(out["value"]["a"]["b"]["c"], "{...} (2 keys)");
    }

    #[tokio::test]
    async fn test_args_override_defaults() {
        let tool = ReadValueTool::new(store_with(json!({"bio": "0123456789abcdef"})), limits());
        let out: Value = serde_json::from_str(
            &tool
                .execute(json!({"path": "/bio", "max_string_length": 100}))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out["value"], "0123456789abcdef");
    }

    #[tokio::test]
    async fn test_not_found() {
        let tool = ReadValueTool::new(store_with(json!({})), limits());
        let out: Value =
            serde_json::from_str(&tool.execute(json!({"path": "/ghost"})).await.unwrap()).unwrap();
        assert_eq!(out["found"], false);
    }
}
