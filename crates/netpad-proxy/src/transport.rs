//! Outbound HTTP adapter.
//!
//! The forwarder only sees [`CallOutcome`]; whatever client library sits
//! underneath, its errors are flattened here into either "the upstream
//! answered with a status" or "no response at all".

use crate::normalize::CallOutcome;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A fully built upstream request. Constructed per inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl OutboundCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the call once. Never fails: transport errors, including a body
    /// that could not be read in full, come back as
    /// [`CallOutcome::TransportFailure`].
    async fn send(&self, call: OutboundCall) -> CallOutcome;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("netpad-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: OutboundCall) -> CallOutcome {
        let mut request_builder = match call.method {
            Method::Get => self.client.get(&call.url),
            Method::Post => self.client.post(&call.url),
        };
        for (name, value) in &call.headers {
            request_builder = request_builder.header(*name, value);
        }
        if let Some(body) = &call.body {
            request_builder = request_builder.json(body);
        }

        let upstream = match request_builder.send().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, url = %call.url, "NetPad request failed");
                return CallOutcome::TransportFailure {
                    message: e.to_string(),
                };
            }
        };

        // A status line alone is not a response: a body cut short by a
        // timeout or reset is still a transport failure.
        let status = upstream.status().as_u16();
        match upstream.bytes().await {
            Ok(b) => CallOutcome::Response {
                status,
                body: decode_body(&b),
            },
            Err(e) => {
                error!(error = %e, %status, url = %call.url, "failed to read NetPad response body");
                CallOutcome::TransportFailure {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// JSON when it parses, the raw text otherwise, `null` when empty.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(br#"{"foo":1}"#), json!({"foo": 1}));
        assert_eq!(decode_body(b"Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let call = OutboundCall {
            method: Method::Get,
            url: "http://localhost/api/mcp/info".to_string(),
            headers: vec![("x-api-key", "k".to_string())],
            body: None,
        };
        assert_eq!(call.header("X-API-Key"), Some("k"));
        assert_eq!(call.header("authorization"), None);
    }
}
