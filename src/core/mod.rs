//! 核心层：错误类型与运行状态

pub mod error;
pub mod state;

pub use error::AgentError;
pub use state::{AgentState, ExtractMetadata, ExtractOutput, Message, Role};
