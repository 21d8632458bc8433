//! 입력 파일 읽기.

use crate::error::{CollectorError, Result};
use serde_json::Value;
use std::path::Path;

/// JSON 파일을 읽습니다.
pub async fn read_json(path: &Path) -> Result<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CollectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|e| CollectorError::input(path, e.to_string()))
}

/// 배열 또는 배열을 담은 객체에서 항목 목록을 꺼냅니다.
///
/// 객체라면 `keys` 중 처음 발견되는 배열 필드를 사용합니다.
pub fn items_of(value: Value, keys: &[&str], path: &Path) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => keys
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                CollectorError::input(path, format!("배열 필드가 없습니다 ({})", keys.join(", ")))
            }),
        _ => Err(CollectorError::input(path, "JSON 배열 또는 객체가 아닙니다")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_of_array_and_wrapped_object() {
        let path = Path::new("x.json");
        assert_eq!(items_of(json!([1, 2]), &["items"], path).unwrap().len(), 2);

        let wrapped = json!({"symbol": "BTCUSD", "data_points": [{"a": 1}]});
        assert_eq!(items_of(wrapped, &["items", "data_points"], path).unwrap().len(), 1);
    }

    #[test]
    fn test_items_of_rejects_scalars_and_missing_fields() {
        let path = Path::new("x.json");
        assert!(items_of(json!(42), &["items"], path).is_err());
        assert!(items_of(json!({"other": []}), &["items"], path).is_err());
    }

    #[tokio::test]
    async fn test_read_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(read_json(&missing).await, Err(CollectorError::Io { .. })));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(matches!(read_json(&broken).await, Err(CollectorError::Input { .. })));
    }
}
