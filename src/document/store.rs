//! 文档仓库：全程唯一的可变 JSON 文档 + 变更日志
//!
//! 所有写入经 apply（整批原子），所有读取经 get / snapshot；
//! 变更日志记录每个成功批次属于哪个 chunk、应用了几条操作。

use serde_json::Value;

use crate::document::patch::{apply_batch, PatchError, PatchOp};
use crate::document::pointer::{resolve, PointerError};

/// 单个成功批次的记录
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// 发起该批次时正在处理的 chunk 下标
    pub chunk_index: usize,
    /// 本批次应用的操作数
    pub ops_applied: usize,
}

/// 文档仓库：持有文档与变更日志，生命周期覆盖整个抽取 run
#[derive(Debug)]
pub struct DocumentStore {
    root: Value,
    change_log: Vec<ChangeRecord>,
    /// 控制循环推进 chunk 时更新，apply 据此归档变更来源
    active_chunk: usize,
}

impl DocumentStore {
    /// 以空对象起步（未提供 schema 骨架时的默认）
    pub fn new() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
            change_log: Vec::new(),
            active_chunk: 0,
        }
    }

    /// 标记当前处理中的 chunk（变更日志归属）
    pub fn set_active_chunk(&mut self, index: usize) {
        self.active_chunk = index;
    }

    /// 按指针读取只读引用
    pub fn get(&self, pointer: &str) -> Result<&Value, PointerError> {
        resolve(&self.root, pointer)
    }

    /// 当前文档快照（供 prompt 注入与工具序列化）
    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }

    /// 原子应用一批 Patch：失败则文档保持不变并返回 PatchError
    pub fn apply(&mut self, ops: &[PatchOp]) -> Result<usize, PatchError> {
        let next = apply_batch(&self.root, ops)?;
        self.root = next;
        self.change_log.push(ChangeRecord {
            chunk_index: self.active_chunk,
            ops_applied: ops.len(),
        });
        Ok(ops.len())
    }

    pub fn change_log(&self) -> &[ChangeRecord] {
        &self.change_log
    }

    /// run 结束后取出最终文档（move，所有权交还调用方）
    pub fn into_value(self) -> Value {
        self.root
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops(raw: serde_json::Value) -> Vec<PatchOp> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_starts_as_empty_object() {
        let store = DocumentStore::new();
        assert_eq!(store.snapshot(), json!({}));
    }

    #[test]
    fn test_apply_mutates_and_logs() {
        let mut store = DocumentStore::new();
        store
            .apply(&ops(json!([{"op": "add", "path": "/age", "value": 29}])))
            .unwrap();
        assert_eq!(store.get("/age").unwrap(), &json!(29));
        assert_eq!(store.change_log().len(), 1);
        assert_eq!(store.change_log()[0].chunk_index, 0);
    }

    #[test]
    fn test_failed_batch_leaves_document_untouched() {
        let mut store = DocumentStore::new();
        store
            .apply(&ops(json!([{"op": "add", "path": "/a", "value": 1}])))
            .unwrap();
        let before = store.snapshot();
        let err = store.apply(&ops(json!([
            {"op": "add", "path": "/b", "value": 2},
            {"op": "remove", "path": "/missing"}
        ])));
        assert!(err.is_err());
        assert_eq!(store.snapshot(), before);
        // 失败批次不入日志
        assert_eq!(store.change_log().len(), 1);
    }

    #[test]
    fn test_cross_chunk_correction() {
        // 后续 chunk 可用 replace 修正先前 chunk 写入的值
        let mut store = DocumentStore::new();
        store
            .apply(&ops(json!([{"op": "add", "path": "/age", "value": 29}])))
            .unwrap();
        store.set_active_chunk(1);
        store
            .apply(&ops(json!([{"op": "replace", "path": "/age", "value": 30}])))
            .unwrap();
        assert_eq!(store.change_log()[1].chunk_index, 1);
        assert_eq!(store.into_value(), json!({"age": 30}));
    }
}
