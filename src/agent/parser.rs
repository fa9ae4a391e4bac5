//! oracle 回复解析：从文本中提取 {think, actions} JSON
//!
//! 容忍 ```json 围栏与前后杂散文本（取第一个 { 到最后一个 }）；
//! 解析失败返回 JsonParseError，由控制循环转为 observation 让 oracle 自行纠正。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;

/// 单个 action 请求：工具名 + JSON 参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub input: Value,
}

/// oracle 的一轮回复
#[derive(Debug, Clone, Deserialize)]
pub struct OracleTurn {
    #[serde(default)]
    pub think: String,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
}

impl OracleTurn {
    /// 是否为收尾轮（update_guidance 为唯一 action）
    pub fn is_finalization(&self) -> bool {
        self.actions.len() == 1 && self.actions[0].action == "update_guidance"
    }

    /// 混入了其他 action 的 update_guidance（违反收尾门控）
    pub fn has_misplaced_finalization(&self) -> bool {
        self.actions.len() > 1 && self.actions.iter().any(|a| a.action == "update_guidance")
    }
}

/// 解析 oracle 输出：提取 JSON 块并反序列化为 OracleTurn
pub fn parse_oracle_turn(output: &str) -> Result<OracleTurn, AgentError> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        return Err(AgentError::JsonParseError(format!(
            "no JSON object in oracle reply: {}",
            preview(trimmed)
        )));
    };

    serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, preview(json_str))))
}

fn preview(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
