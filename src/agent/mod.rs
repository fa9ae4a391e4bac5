//! Agent 层：prompt 构建、oracle 回复解析、单 chunk 控制循环与抽取入口

pub mod extract;
pub mod loop_;
pub mod parser;
pub mod prompts;

pub use extract::Extractor;
pub use loop_::{run_chunk, ChunkOutcome, ChunkSession};
pub use parser::{parse_oracle_turn, ActionRequest, OracleTurn};
