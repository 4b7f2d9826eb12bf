//! Request/response envelope shared by every backend call.
//!
//! The backend is inconsistent about key casing (`Success` vs `success`), so
//! responses are normalized here and nowhere else.

use serde::{Deserialize, Serialize};

/// Outgoing request wrapper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiRequest<P> {
    /// Client-generated correlation id, `"<op>-<epoch-ms>"`.
    pub request_id: String,
    /// Empty when unauthenticated.
    pub auth_token: String,
    pub payload: P,
}

impl<P: Serialize> ApiRequest<P> {
    pub fn new(op: &str, auth_token: impl Into<String>, payload: P) -> Self {
        Self {
            request_id: request_id(op),
            auth_token: auth_token.into(),
            payload,
        }
    }
}

/// Build a request id for `op` from the current wall clock.
pub fn request_id(op: &str) -> String {
    format!("{op}-{}", chrono::Utc::now().timestamp_millis())
}

/// Normalized response wrapper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "Success", alias = "success", default)]
    pub success: bool,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: String,
    #[serde(rename = "Data", alias = "data", default)]
    pub data: serde_json::Value,
}

impl ApiResponse {
    /// Parse a raw body. Returns `None` when the body is not an envelope.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let obj = value.as_object()?;
        let looks_enveloped = ["Success", "success", "Message", "message", "Data", "data"]
            .iter()
            .any(|k| obj.contains_key(*k));
        if !looks_enveloped {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Message text, falling back to `default` when the backend sent none.
    pub fn message_or(&self, default: &str) -> String {
        if self.message.trim().is_empty() {
            default.to_string()
        } else {
            self.message.clone()
        }
    }
}

/// Look up `key` in a JSON object, accepting PascalCase or camelCase.
pub fn field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get(key) {
        return Some(v);
    }
    let mut chars = key.chars();
    let first = chars.next()?;
    let flipped: String = if first.is_uppercase() {
        first.to_lowercase().chain(chars).collect()
    } else {
        first.to_uppercase().chain(chars).collect()
    };
    obj.get(&flipped)
}

/// Read a field as a string; numbers are stringified.
pub fn field_str(value: &serde_json::Value, key: &str) -> Option<String> {
    match field(value, key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_both_capitalizations() {
        let upper = ApiResponse::from_value(json!({
            "Success": true, "Message": "ok", "Data": {"EmpId": 7}
        }))
        .unwrap();
        let lower = ApiResponse::from_value(json!({
            "success": true, "message": "ok", "data": {"EmpId": 7}
        }))
        .unwrap();
        assert_eq!(upper, lower);
        assert!(upper.success);
        assert_eq!(upper.data["EmpId"], 7);
    }

    #[test]
    fn missing_keys_default() {
        let resp = ApiResponse::from_value(json!({"success": false})).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message_or("Registration failed"), "Registration failed");
        assert!(resp.data.is_null());
    }

    #[test]
    fn non_envelope_bodies_are_not_parsed() {
        assert!(ApiResponse::from_value(json!([1, 2, 3])).is_none());
        assert!(ApiResponse::from_value(json!({"ProductId": 1})).is_none());
    }

    #[test]
    fn request_serializes_pascal_case() {
        let req = ApiRequest::new("employer-register", "", json!({"Name": "Acme"}));
        let v = serde_json::to_value(&req).unwrap();
        assert!(v["RequestId"].as_str().unwrap().starts_with("employer-register-"));
        assert_eq!(v["AuthToken"], "");
        assert_eq!(v["Payload"]["Name"], "Acme");
    }

    #[test]
    fn field_lookup_flips_first_letter() {
        let v = json!({"status": "approved", "EmpId": 12});
        assert_eq!(field_str(&v, "Status").as_deref(), Some("approved"));
        assert_eq!(field_str(&v, "empId").as_deref(), Some("12"));
        assert!(field(&v, "RejectionReason").is_none());
    }
}
