//! JSON Patch（RFC 6902）引擎
//!
//! add / remove / replace / move / copy / test 六种操作，按序应用；
//! 批次原子性：任一操作失败则整批放弃，文档保持应用前状态。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::pointer::{parse_pointer_lenient, resolve};

/// 单条 Patch 操作（`op` 字段区分类型，路径均为 JSON Pointer）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    /// 操作名（用于日志与错误信息）
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Remove { .. } => "remove",
            PatchOp::Replace { .. } => "replace",
            PatchOp::Move { .. } => "move",
            PatchOp::Copy { .. } => "copy",
            PatchOp::Test { .. } => "test",
        }
    }
}

/// 批次失败：记录失败下标与原因，文档未被修改
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("patch operation {index} ({op}) failed: {reason}")]
pub struct PatchError {
    pub index: usize,
    pub op: String,
    pub reason: String,
}

/// 原子应用一批操作：在副本上逐条执行，全部成功才返回新文档
pub fn apply_batch(document: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for (index, op) in ops.iter().enumerate() {
        apply_one(&mut working, op).map_err(|reason| PatchError {
            index,
            op: op.name().to_string(),
            reason,
        })?;
    }
    Ok(working)
}

fn apply_one(doc: &mut Value, op: &PatchOp) -> Result<(), String> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => replace(doc, path, value.clone()),
        PatchOp::Move { from, path } => {
            // RFC 6902：禁止把节点移动到自身子孙路径下
            if is_proper_prefix(from, path) {
                return Err(format!("cannot move '{from}' into its own child '{path}'"));
            }
            let taken = remove(doc, from)?;
            add(doc, path, taken)
        }
        PatchOp::Copy { from, path } => {
            let copied = resolve(doc, from).map_err(|e| e.to_string())?.clone();
            add(doc, path, copied)
        }
        PatchOp::Test { path, value } => {
            let actual = resolve(doc, path).map_err(|e| e.to_string())?;
            if actual == value {
                Ok(())
            } else {
                Err(format!(
                    "test failed at '{path}': expected {value}, found {actual}"
                ))
            }
        }
    }
}

/// `from` 是否为 `path` 的真前缀（按 token 比较，避免 `/ab` 误判为 `/a` 的子路径）
fn is_proper_prefix(from: &str, path: &str) -> bool {
    let from_tokens = parse_pointer_lenient(from);
    let path_tokens = parse_pointer_lenient(path);
    path_tokens.len() > from_tokens.len()
        && path_tokens[..from_tokens.len()] == from_tokens[..]
}

/// 定位父容器与末 token；根路径返回 None
fn split_parent<'a>(
    doc: &'a mut Value,
    path: &str,
) -> Result<Option<(&'a mut Value, String)>, String> {
    let mut tokens = parse_pointer_lenient(path);
    let Some(last) = tokens.pop() else {
        return Ok(None);
    };
    let mut current = doc;
    for token in &tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| format!("path '{path}' does not resolve (missing '{token}')"))?,
            Value::Array(items) => {
                let idx: usize = token
                    .parse()
                    .map_err(|_| format!("invalid array index '{token}' in '{path}'"))?;
                let len = items.len();
                items
                    .get_mut(idx)
                    .ok_or_else(|| format!("array index {idx} out of bounds (len {len}) in '{path}'"))?
            }
            _ => return Err(format!("path '{path}' traverses a scalar at '{token}'")),
        };
    }
    Ok(Some((current, last)))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), String> {
    match split_parent(doc, path)? {
        None => {
            *doc = value;
            Ok(())
        }
        Some((parent, last)) => match parent {
            Value::Object(map) => {
                map.insert(last, value);
                Ok(())
            }
            Value::Array(items) => {
                if last == "-" {
                    items.push(value);
                    return Ok(());
                }
                let idx: usize = last
                    .parse()
                    .map_err(|_| format!("invalid array index '{last}' in '{path}'"))?;
                if idx > items.len() {
                    return Err(format!(
                        "array index {idx} out of bounds for add (len {}) in '{path}'",
                        items.len()
                    ));
                }
                items.insert(idx, value);
                Ok(())
            }
            _ => Err(format!("cannot add under scalar parent in '{path}'")),
        },
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, String> {
    match split_parent(doc, path)? {
        None => Err("cannot remove the document root".to_string()),
        Some((parent, last)) => match parent {
            Value::Object(map) => map
                .shift_remove(&last)
                .ok_or_else(|| format!("key '{last}' not found for remove in '{path}'")),
            Value::Array(items) => {
                let idx: usize = last
                    .parse()
                    .map_err(|_| format!("invalid array index '{last}' in '{path}'"))?;
                if idx >= items.len() {
                    return Err(format!(
                        "array index {idx} out of bounds for remove (len {}) in '{path}'",
                        items.len()
                    ));
                }
                Ok(items.remove(idx))
            }
            _ => Err(format!("cannot remove from scalar parent in '{path}'")),
        },
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<(), String> {
    match split_parent(doc, path)? {
        None => {
            *doc = value;
            Ok(())
        }
        Some((parent, last)) => match parent {
            Value::Object(map) => {
                let slot = map
                    .get_mut(&last)
                    .ok_or_else(|| format!("key '{last}' not found for replace in '{path}'"))?;
                *slot = value;
                Ok(())
            }
            Value::Array(items) => {
                let idx: usize = last
                    .parse()
                    .map_err(|_| format!("invalid array index '{last}' in '{path}'"))?;
                let len = items.len();
                let slot = items.get_mut(idx).ok_or_else(|| {
                    format!("array index {idx} out of bounds for replace (len {len}) in '{path}'")
                })?;
                *slot = value;
                Ok(())
            }
            _ => Err(format!("cannot replace under scalar parent in '{path}'")),
        },
    }
}
