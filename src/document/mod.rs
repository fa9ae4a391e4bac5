//! 文档层：JSON Pointer 定位、JSON Patch 引擎与文档仓库

pub mod patch;
pub mod pointer;
pub mod store;

pub use patch::{apply_batch, PatchError, PatchOp};
pub use pointer::{
    decode_token, encode_token, join_pointer, parse_pointer, parse_pointer_lenient, resolve,
    PointerError,
};
pub use store::{ChangeRecord, DocumentStore};
