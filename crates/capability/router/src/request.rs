//! PATCH 请求体解析：只允许写 `standard.state` 与 `standard.activity`。

use serde_json::{Map, Value};
use udm_state::PatchDocument;

/// PATCH 请求体校验错误；错误信息直接作为 400 响应返回。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchRequestError {
    #[error("Request body is empty")]
    EmptyBody,
    #[error("Error parsing request: {0}")]
    InvalidJson(String),
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("apiVersion is required in PATCH requests")]
    MissingApiVersion,
    #[error("{0} properties are read-only and cannot be modified")]
    ReadOnlyBlock(String),
    #[error("standard.{0} is read-only. Only state and activity are writable")]
    ReadOnlyField(String),
    #[error("standard is required. Only standard.state and standard.activity are writable")]
    MissingStandard,
    #[error("No writable properties provided. Only standard.state and standard.activity are writable")]
    NoWritableField,
}

const WRITABLE_FIELDS: [&str; 2] = ["state", "activity"];

/// 解析并校验 PATCH 请求体，返回只含 `standard` 块的补丁文档。
///
/// key 不区分大小写；`apiVersion` 必须存在，但作为请求信封处理，不写入期望状态。
pub fn parse_patch_request(body: &[u8]) -> Result<PatchDocument, PatchRequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PatchRequestError::EmptyBody);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| PatchRequestError::InvalidJson(err.to_string()))?;
    let Value::Object(root) = value else {
        return Err(PatchRequestError::NotAnObject);
    };

    if !root.keys().any(|key| key.eq_ignore_ascii_case("apiVersion")) {
        return Err(PatchRequestError::MissingApiVersion);
    }

    let mut standard = None;
    for (key, value) in &root {
        match key.to_ascii_lowercase().as_str() {
            "status" | "custom" => {
                return Err(PatchRequestError::ReadOnlyBlock(key.to_ascii_lowercase()));
            }
            "standard" => standard = Some(value),
            _ => {}
        }
    }
    let standard = match standard {
        Some(Value::Object(block)) => block,
        _ => return Err(PatchRequestError::MissingStandard),
    };

    let mut writable = Map::new();
    for (key, value) in standard {
        if !WRITABLE_FIELDS
            .iter()
            .any(|field| field.eq_ignore_ascii_case(key))
        {
            return Err(PatchRequestError::ReadOnlyField(key.clone()));
        }
        if !value.is_null() {
            writable.insert(key.clone(), value.clone());
        }
    }
    if writable.is_empty() {
        return Err(PatchRequestError::NoWritableField);
    }

    let mut document = Map::new();
    document.insert("standard".to_string(), Value::Object(writable));
    Ok(PatchDocument::new(Value::Object(document)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<PatchDocument, PatchRequestError> {
        parse_patch_request(value.to_string().as_bytes())
    }

    #[test]
    fn accepts_state_and_activity() {
        let document = parse(json!({
            "apiVersion": "1.0.0",
            "standard": {"state": "active", "activity": "Presenting"}
        }))
        .expect("valid request");
        assert_eq!(
            document.as_value(),
            &json!({"standard": {"state": "active", "activity": "Presenting"}})
        );
    }

    #[test]
    fn rejects_empty_and_malformed_bodies() {
        assert_eq!(parse_patch_request(b""), Err(PatchRequestError::EmptyBody));
        assert_eq!(parse_patch_request(b"  \n"), Err(PatchRequestError::EmptyBody));
        assert!(matches!(
            parse_patch_request(b"{not json"),
            Err(PatchRequestError::InvalidJson(_))
        ));
        assert_eq!(parse(json!([1, 2])), Err(PatchRequestError::NotAnObject));
    }

    #[test]
    fn requires_api_version() {
        assert_eq!(
            parse(json!({"standard": {"state": "active"}})),
            Err(PatchRequestError::MissingApiVersion)
        );
    }

    #[test]
    fn rejects_read_only_blocks_and_fields() {
        assert_eq!(
            parse(json!({"apiVersion": "1.0.0", "standard": {"state": "x"}, "Status": {}})),
            Err(PatchRequestError::ReadOnlyBlock("status".to_string()))
        );
        assert_eq!(
            parse(json!({"apiVersion": "1.0.0", "custom": {}})),
            Err(PatchRequestError::ReadOnlyBlock("custom".to_string()))
        );
        let err = parse(json!({"apiVersion": "1.0.0", "standard": {"error": "x"}}))
            .expect_err("error is read-only");
        assert_eq!(
            err.to_string(),
            "standard.error is read-only. Only state and activity are writable"
        );
    }

    #[test]
    fn requires_a_writable_field() {
        assert_eq!(
            parse(json!({"apiVersion": "1.0.0"})),
            Err(PatchRequestError::MissingStandard)
        );
        assert_eq!(
            parse(json!({"apiVersion": "1.0.0", "standard": {}})),
            Err(PatchRequestError::NoWritableField)
        );
        assert_eq!(
            parse(json!({"apiVersion": "1.0.0", "standard": {"state": null}})),
            Err(PatchRequestError::NoWritableField)
        );
    }
}
