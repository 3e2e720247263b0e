//! Classification of forwarded call outcomes.
//!
//! Every forward ends in exactly one [`NormalizedResult`]. Rules are applied in
//! order: 2xx success, 401/403 auth, 404 not-found, any other status passed
//! through, and only a missing response becomes a connection error.

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::{json, Map, Value};
use tracing::warn;

pub const AUTH_ERROR_CODE: &str = "AUTH_ERROR";
pub const NOT_FOUND_CODE: &str = "NOT_FOUND";
pub const CONNECTION_ERROR_CODE: &str = "NETPAD_CONNECTION_ERROR";
pub const CONFIG_ERROR_CODE: &str = "CONFIG_ERROR";

pub const CONNECTION_ERROR_STATUS: u16 = 502;
pub const CONFIG_ERROR_STATUS: u16 = 500;

const AUTH_MESSAGE: &str =
    "Authentication failed: the NetPad API key is invalid, expired or missing";
const AUTH_SUGGESTION: &str = concat!(
    "Run `netpad-proxy config set apiKey <key>` with a valid key, ",
    "or regenerate the key in NetPad under Settings > API Keys"
);
const NOT_FOUND_MESSAGE: &str = "The requested resource was not found on the NetPad server";
const CONFIG_MESSAGE: &str = "The netpad-proxy configuration could not be read";
const CONFIG_SUGGESTION: &str = concat!(
    "Inspect the stored values with `netpad-proxy config show`, or reset them with ",
    "`netpad-proxy config clear` and set netpadUrl and apiKey again"
);
const CONNECTION_SUGGESTION: &str = concat!(
    "Check your network connection, firewall settings ",
    "and that the configured netpadUrl is correct"
);

/// What the transport observed, independent of any HTTP client library.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The upstream answered, whatever the status.
    Response { status: u16, body: Value },
    /// No response: DNS failure, refused connection, timeout.
    TransportFailure { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    Success {
        status: u16,
        body: Value,
    },
    AuthError {
        status: u16,
        message: String,
        suggestion: String,
        detail: Value,
    },
    NotFoundError {
        status: u16,
        message: String,
        detail: Value,
    },
    ConnectionError {
        status: u16,
        message: String,
        detail: Value,
        suggestion: String,
    },
    UpstreamError {
        status: u16,
        body: Value,
    },
    /// The proxy's own configuration could not be read; nothing was sent.
    ConfigError {
        status: u16,
        message: String,
        detail: Value,
        suggestion: String,
    },
}

/// Classify one call outcome. `base_url` is only used to describe
/// connection failures.
pub fn normalize(outcome: CallOutcome, base_url: &str) -> NormalizedResult {
    match outcome {
        CallOutcome::Response { status, body } if (200..300).contains(&status) => {
            NormalizedResult::Success { status, body }
        }
        CallOutcome::Response { status, body } => {
            warn!(%status, "NetPad returned an error status");
            match status {
                401 | 403 => NormalizedResult::auth_error(status, body),
                404 => NormalizedResult::NotFoundError {
                    status,
                    message: NOT_FOUND_MESSAGE.to_string(),
                    detail: body,
                },
                _ => NormalizedResult::UpstreamError { status, body },
            }
        }
        CallOutcome::TransportFailure { message } => NormalizedResult::ConnectionError {
            status: CONNECTION_ERROR_STATUS,
            message: format!("Unable to connect to NetPad at {}", base_url),
            detail: Value::String(message),
            suggestion: CONNECTION_SUGGESTION.to_string(),
        },
    }
}

impl NormalizedResult {
    pub(crate) fn auth_error(status: u16, detail: Value) -> Self {
        NormalizedResult::AuthError {
            status,
            message: AUTH_MESSAGE.to_string(),
            suggestion: AUTH_SUGGESTION.to_string(),
            detail,
        }
    }

    pub(crate) fn config_error(detail: String) -> Self {
        NormalizedResult::ConfigError {
            status: CONFIG_ERROR_STATUS,
            message: CONFIG_MESSAGE.to_string(),
            detail: Value::String(detail),
            suggestion: CONFIG_SUGGESTION.to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            NormalizedResult::Success { status, .. }
            | NormalizedResult::AuthError { status, .. }
            | NormalizedResult::NotFoundError { status, .. }
            | NormalizedResult::ConnectionError { status, .. }
            | NormalizedResult::UpstreamError { status, .. }
            | NormalizedResult::ConfigError { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NormalizedResult::Success { .. })
    }

    /// `error.code` discriminator for the wrapped error variants.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            NormalizedResult::AuthError { .. } => Some(AUTH_ERROR_CODE),
            NormalizedResult::NotFoundError { .. } => Some(NOT_FOUND_CODE),
            NormalizedResult::ConnectionError { .. } => Some(CONNECTION_ERROR_CODE),
            NormalizedResult::ConfigError { .. } => Some(CONFIG_ERROR_CODE),
            NormalizedResult::Success { .. } | NormalizedResult::UpstreamError { .. } => None,
        }
    }

    /// The JSON body sent back to the client.
    pub fn body(&self) -> Value {
        match self {
            NormalizedResult::Success { body, .. }
            | NormalizedResult::UpstreamError { body, .. } => body.clone(),
            NormalizedResult::AuthError {
                status,
                message,
                suggestion,
                detail,
            }
            | NormalizedResult::ConnectionError {
                status,
                message,
                detail,
                suggestion,
            }
            | NormalizedResult::ConfigError {
                status,
                message,
                detail,
                suggestion,
            } => error_envelope(*status, message, self.error_code(), detail, Some(suggestion)),
            NormalizedResult::NotFoundError {
                status,
                message,
                detail,
            } => error_envelope(*status, message, self.error_code(), detail, None),
        }
    }

    pub fn into_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::BAD_GATEWAY);
        HttpResponse::build(status).json(self.body())
    }
}

fn error_envelope(
    status: u16,
    message: &str,
    code: Option<&'static str>,
    detail: &Value,
    suggestion: Option<&String>,
) -> Value {
    let mut error = Map::new();
    error.insert("code".to_string(), json!(code));
    error.insert("message".to_string(), json!(detail_message(detail, message)));
    error.insert("details".to_string(), detail.clone());
    if let Some(s) = suggestion {
        error.insert("suggestion".to_string(), json!(s));
    }

    json!({
        "success": false,
        "status": status,
        "message": message,
        "error": error,
    })
}

/// Best human-readable line from an upstream detail, falling back to the
/// fixed message.
fn detail_message(detail: &Value, fallback: &str) -> String {
    match detail {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("error").and_then(|e| e.get("message")))
            .or_else(|| obj.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or(fallback)
            .to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://netpad.test";

    fn response(status: u16, body: Value) -> CallOutcome {
        CallOutcome::Response { status, body }
    }

    #[test]
    fn test_success_is_verbatim() {
        let body = json!({"success": true, "data": [1, 2, 3]});
        let result = normalize(response(201, body.clone()), BASE);
        assert_eq!(result, NormalizedResult::Success { status: 201, body: body.clone() });
        assert_eq!(result.body(), body);
        assert_eq!(result.error_code(), None);
    }

    #[test]
    fn test_401_and_403_are_auth_errors() {
        for status in [401, 403] {
            let result = normalize(response(status, json!({"error": "bad key"})), BASE);
            assert!(matches!(result, NormalizedResult::AuthError { .. }));
            assert_eq!(result.status(), status);

            let body = result.body();
            assert_eq!(body["success"], false);
            assert_eq!(body["status"], status);
            assert_eq!(body["message"], AUTH_MESSAGE);
            assert_eq!(body["error"]["code"], "AUTH_ERROR");
            assert_eq!(body["error"]["message"], "bad key");
            assert_eq!(body["error"]["details"], json!({"error": "bad key"}));
            assert_eq!(body["error"]["suggestion"], AUTH_SUGGESTION);
        }
    }

    #[test]
    fn test_404_is_not_found() {
        let result = normalize(response(404, json!({"message": "no such tool"})), BASE);
        assert!(matches!(result, NormalizedResult::NotFoundError { .. }));

        let body = result.body();
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], NOT_FOUND_MESSAGE);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "no such tool");
        assert!(body["error"].get("suggestion").is_none());
    }

    #[test]
    fn test_other_statuses_pass_through_unchanged() {
        let result = normalize(response(500, json!({"foo": 1})), BASE);
        assert_eq!(
            result,
            NormalizedResult::UpstreamError { status: 500, body: json!({"foo": 1}) }
        );
        assert_eq!(result.body(), json!({"foo": 1}));

        let result = normalize(response(422, json!("unprocessable")), BASE);
        assert_eq!(result.status(), 422);
        assert_eq!(result.body(), json!("unprocessable"));
    }

    #[test]
    fn test_transport_failure_is_connection_error() {
        let result = normalize(
            CallOutcome::TransportFailure { message: "connection refused".to_string() },
            BASE,
        );
        assert_eq!(result.status(), 502);

        let body = result.body();
        assert_eq!(body["error"]["code"], "NETPAD_CONNECTION_ERROR");
        assert!(body["message"].as_str().unwrap().contains(BASE));
        assert_eq!(body["error"]["message"], "connection refused");
        assert_eq!(body["error"]["suggestion"], CONNECTION_SUGGESTION);
    }

    #[test]
    fn test_upstream_502_is_not_a_connection_error() {
        let result = normalize(response(502, json!({"upstream": "down"})), BASE);
        assert!(matches!(result, NormalizedResult::UpstreamError { .. }));
    }

    #[test]
    fn test_config_error_envelope() {
        let detail = "expected value at line 1 column 1".to_string();
        let result = NormalizedResult::config_error(detail);
        assert_eq!(result.status(), 500);
        assert_eq!(result.error_code(), Some("CONFIG_ERROR"));

        let body = result.body();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], CONFIG_MESSAGE);
        assert_eq!(body["error"]["message"], "expected value at line 1 column 1");
        assert_eq!(body["error"]["suggestion"], CONFIG_SUGGESTION);
        assert!(!body["message"].as_str().unwrap().contains("API key"));
    }

    #[test]
    fn test_detail_message_fallbacks() {
        assert_eq!(detail_message(&Value::Null, "fixed"), "fixed");
        assert_eq!(detail_message(&json!(""), "fixed"), "fixed");
        assert_eq!(
            detail_message(&json!({"error": {"message": "nested"}}), "fixed"),
            "nested"
        );
        assert_eq!(detail_message(&json!({"other": 1}), "fixed"), "fixed");
    }
}
