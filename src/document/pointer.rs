//! JSON Pointer（RFC 6901）解析与解析定位
//!
//! `~0`/`~1` 转义、严格与宽松两种解析（宽松版自动补前导 `/`），resolve 沿 token 逐层定位。

use serde_json::Value;
use thiserror::Error;

/// 指针解析/定位错误：供工具层转为 observation JSON，不终止进程
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("Invalid JSON Pointer (must start with '/'): {0}")]
    InvalidSyntax(String),

    #[error("Pointer not found: {0}")]
    NotFound(String),

    #[error("Invalid array index '{index}' in pointer: {pointer}")]
    InvalidIndex { pointer: String, index: String },
}

/// 将单个 token 还原：`~1` -> `/`、`~0` -> `~`（顺序不可颠倒）
pub fn decode_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// 将字符串转义为指针 token：`~` -> `~0`、`/` -> `~1`（顺序不可颠倒）
pub fn encode_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// 严格解析指针为 token 列表；`""` 与 `"/"` 视为根（空列表）
pub fn parse_pointer(path: &str) -> Result<Vec<String>, PointerError> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(PointerError::InvalidSyntax(path.to_string()));
    }
    Ok(path[1..].split('/').map(decode_token).collect())
}

/// 宽松解析：缺少前导 `/` 时自动补上（LLM 常漏写），不报语法错误
pub fn parse_pointer_lenient(path: &str) -> Vec<String> {
    if path.is_empty() || path == "/" {
        return Vec::new();
    }
    let normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    normalized[1..].split('/').map(decode_token).collect()
}

/// 拼接指针与 token（token 自动转义）
pub fn join_pointer(base: &str, token: &str) -> String {
    let escaped = encode_token(token);
    if base.is_empty() {
        format!("/{escaped}")
    } else {
        format!("{base}/{escaped}")
    }
}

/// 沿指针定位只读引用；路径不存在返回 NotFound，数组下标非法返回 InvalidIndex
pub fn resolve<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PointerError> {
    let tokens = parse_pointer_lenient(path);
    let mut current = root;
    for token in &tokens {
        match current {
            Value::Object(map) => {
                current = map
                    .get(token)
                    .ok_or_else(|| PointerError::NotFound(path.to_string()))?;
            }
            Value::Array(items) => {
                let idx: usize = token.parse().map_err(|_| PointerError::InvalidIndex {
                    pointer: path.to_string(),
                    index: token.clone(),
                })?;
                current = items
                    .get(idx)
                    .ok_or_else(|| PointerError::NotFound(path.to_string()))?;
            }
            _ => return Err(PointerError::NotFound(path.to_string())),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_escaping_round_trip() {
        assert_eq!(encode_token("a/b~c"), "a~1b~0c");
        assert_eq!(decode_token("a~1b~0c"), "a/b~c");
    }

    #[test]
    fn test_parse_root() {
        assert!(parse_pointer("").unwrap().is_empty());
        assert!(parse_pointer("/").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_slash() {
        assert!(matches!(
            parse_pointer("name"),
            Err(PointerError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_lenient_prepends_slash() {
        assert_eq!(parse_pointer_lenient("name"), vec!["name".to_string()]);
        assert_eq!(
            parse_pointer_lenient("/a/b"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_resolve_nested() {
        let doc = json!({"employees": [{"name": "Ana"}, {"name": "Bob"}]});
        let v = resolve(&doc, "/employees/1/name").unwrap();
        assert_eq!(v, &json!("Bob"));
    }

    #[test]
    fn test_resolve_escaped_key() {
        let doc = json!({"a/b": {"c~d": 1}});
        assert_eq!(resolve(&doc, "/a~1b/c~0d").unwrap(), &json!(1));
    }

    #[test]
    fn test_resolve_not_found() {
        let doc = json!({"a": 1});
        assert!(matches!(
            resolve(&doc, "/missing"),
            Err(PointerError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_bad_array_index() {
        let doc = json!([1, 2, 3]);
        assert!(matches!(
            resolve(&doc, "/x"),
            Err(PointerError::InvalidIndex { .. })
        ));
        assert!(matches!(resolve(&doc, "/9"), Err(PointerError::NotFound(_))));
    }

    #[test]
    fn test_join_pointer() {
        assert_eq!(join_pointer("", "sections"), "/sections");
        assert_eq!(join_pointer("/sections", "0"), "/sections/0");
        assert_eq!(join_pointer("", "a/b"), "/a~1b");
    }
}
