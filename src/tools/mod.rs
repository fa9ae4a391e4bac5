//! 工具箱：指针读查工具、Patch 工具、收尾工具与执行器
//!
//! 五个工具构成 oracle 的全部能力面：inspect_keys / read_value / search_pointer
//! 只读，apply_patches 是唯一写入口，update_guidance 收尾当前 chunk。

pub mod apply_patches;
pub mod executor;
pub mod inspect_keys;
pub mod read_value;
pub mod registry;
pub mod search_pointer;
pub mod update_guidance;

use std::sync::{Arc, Mutex};

use crate::config::ToolsSection;
use crate::document::DocumentStore;

pub use apply_patches::ApplyPatchesTool;
pub use executor::ToolExecutor;
pub use inspect_keys::InspectKeysTool;
pub use read_value::{ReadLimits, ReadValueTool};
pub use registry::{Tool, ToolRegistry};
pub use search_pointer::{SearchLimits, SearchPointerTool};
pub use update_guidance::{build_guidance, UpdateGuidanceTool};

/// 注册完整工具目录（名称与参数形状固定，prompt 依赖注册顺序稳定）
pub fn build_registry(store: Arc<Mutex<DocumentStore>>, cfg: &ToolsSection) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(InspectKeysTool::new(store.clone()));
    registry.register(ReadValueTool::new(
        store.clone(),
        ReadLimits::from_config(cfg),
    ));
    registry.register(SearchPointerTool::new(
        store.clone(),
        SearchLimits::from_config(cfg),
    ));
    registry.register(ApplyPatchesTool::new(store));
    registry.register(UpdateGuidanceTool);
    registry
}
