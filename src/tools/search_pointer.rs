//! search_pointer 工具：深度优先扫描文档，按键或标量值匹配，返回 JSON Pointer 列表
//!
//! 匹配语义：默认大小写不敏感子串；fuzzy 模式要求查询的所有空白分隔词都出现。
//! 空查询匹配一切（配合 key 模式可当作「列出所有指针」的廉价探针）。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ToolsSection;
use crate::document::pointer::join_pointer;
use crate::document::DocumentStore;
use crate::tools::Tool;

/// 搜索参数上限（默认取自 [tools] 配置）
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub limit: usize,
    pub max_value_length: usize,
}

impl SearchLimits {
    pub fn from_config(cfg: &ToolsSection) -> Self {
        Self {
            limit: cfg.search_limit,
            max_value_length: cfg.max_value_length,
        }
    }
}

pub struct SearchPointerTool {
    store: Arc<Mutex<DocumentStore>>,
    defaults: SearchLimits,
}

impl SearchPointerTool {
    pub fn new(store: Arc<Mutex<DocumentStore>>, defaults: SearchLimits) -> Self {
        Self { store, defaults }
    }
}

#[async_trait]
impl Tool for SearchPointerTool {
    fn name(&self) -> &str {
        "search_pointer"
    }

    fn description(&self) -> &str {
        "Searches the JSON document for a key or value and returns matching JSON Pointers. Args: {\"query\": \"string\", \"type\": \"key|value\", \"fuzzy_match\"?: bool}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "type": {"type": "string", "enum": ["key", "value"]},
                "fuzzy_match": {"type": "boolean"},
                "limit": {"type": "integer"},
                "max_value_length": {"type": "integer"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let search_type = args
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("value")
            .to_string();
        let fuzzy = args
            .get("fuzzy_match")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(self.defaults.limit);
        let max_value_length = args
            .get("max_value_length")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(self.defaults.max_value_length);

        let snapshot = {
            let store = self
                .store
                .lock()
                .map_err(|_| "document store lock poisoned".to_string())?;
            store.snapshot()
        };

        let mut matches = Vec::new();
        let truncated = search_recursive(
            &snapshot,
            "",
            query,
            &search_type,
            fuzzy,
            &mut matches,
            limit,
            max_value_length,
        );

        let result = json!({
            "query": query,
            "type": search_type,
            "fuzzy": fuzzy,
            "count": matches.len(),
            "matches": matches,
            "truncated": truncated,
        });
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

/// 深度优先遍历；命中即收集，达到 limit 返回 true（截断标记）
#[allow(clippy::too_many_arguments)]
fn search_recursive(
    node: &Value,
    current_path: &str,
    query: &str,
    search_type: &str,
    fuzzy: bool,
    matches: &mut Vec<Value>,
    limit: usize,
    max_value_length: usize,
) -> bool {
    if matches.len() >= limit {
        return true;
    }

    match node {
        Value::Object(map) => {
            for (key, value) in map {
                if matches.len() >= limit {
                    return true;
                }
                let new_path = join_pointer(current_path, key);

                if search_type == "key" && matches_query(key, query, fuzzy) {
                    matches.push(json!({
                        "pointer": new_path,
                        "key": key,
                        "value_preview": preview(value, max_value_length),
                    }));
                } else if search_type == "value"
                    && !value.is_object()
                    && !value.is_array()
                    && matches_query(&scalar_text(value), query, fuzzy)
                {
                    matches.push(json!({
                        "pointer": new_path,
                        "matched_value": clip(&scalar_text(value), max_value_length),
                    }));
                }

                if value.is_object() || value.is_array() {
                    if search_recursive(
                        value,
                        &new_path,
                        query,
                        search_type,
                        fuzzy,
                        matches,
                        limit,
                        max_value_length,
                    ) {
                        return true;
                    }
                }
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                if matches.len() >= limit {
                    return true;
                }
                let new_path = format!("{current_path}/{idx}");

                if search_type == "value"
                    && !item.is_object()
                    && !item.is_array()
                    && matches_query(&scalar_text(item), query, fuzzy)
                {
                    matches.push(json!({
                        "pointer": new_path,
                        "matched_value": clip(&scalar_text(item), max_value_length),
                    }));
                }

                if item.is_object() || item.is_array() {
                    if search_recursive(
                        item,
                        &new_path,
                        query,
                        search_type,
                        fuzzy,
                        matches,
                        limit,
                        max_value_length,
                    ) {
                        return true;
                    }
                }
            }
        }
        _ => {}
    }
    false
}

fn matches_query(text: &str, query: &str, fuzzy: bool) -> bool {
    if query.is_empty() {
        return true;
    }
    let text_lower = text.to_lowercase();
    let query_lower = query.to_lowercase();
    if fuzzy {
        query_lower
            .split_whitespace()
            .all(|word| text_lower.contains(word))
    } else {
        text_lower.contains(&query_lower)
    }
}

/// 标量转匹配文本（字符串不带引号，其余用 JSON 字面量）
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clip(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect()
    } else {
        text.to_string()
    }
}

fn preview(value: &Value, max_len: usize) -> String {
    match value {
        Value::Object(map) => format!("{{...}} ({} keys)", map.len()),
        Value::Array(items) => format!("[...] ({} items)", items.len()),
        other => {
            let s = scalar_text(other);
            if s.chars().count() > max_len {
                format!("{}...", s.chars().take(max_len).collect::<String>())
            } else {
                s
            }
        }
    }
}
