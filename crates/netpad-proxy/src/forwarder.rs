//! Request forwarding.
//!
//! One parametrized forwarder serves every route: the route table only says
//! which upstream path to hit, what to do with the inbound query string and
//! whether the command-body defaults apply.

use crate::config::{CredentialStore, UpstreamTarget};
use crate::normalize::{normalize, NormalizedResult};
use crate::transport::{Method, OutboundCall, Transport};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Every NetPad MCP endpoint lives under this prefix.
pub const UPSTREAM_API_PREFIX: &str = "/api/mcp";

pub const API_KEY_HEADER: &str = "x-api-key";

pub const CLIENT_ID: &str = "netpad-proxy";
pub const CLIENT_PLATFORM: &str = "claude-code";

/// What happens to the inbound query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Drop,
    Forward,
    Fixed(&'static str),
}

/// How one inbound endpoint maps onto NetPad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Upstream path; `None` reuses the inbound path.
    pub upstream_path: Option<&'static str>,
    pub query: QueryMode,
    pub inject_command_defaults: bool,
}

impl Route {
    pub const INFO: Route = Route {
        name: "info",
        upstream_path: Some("/info"),
        query: QueryMode::Drop,
        inject_command_defaults: false,
    };
    pub const TOOLS: Route = Route {
        name: "tools",
        upstream_path: None,
        query: QueryMode::Forward,
        inject_command_defaults: false,
    };
    pub const TOOL_DETAIL: Route = Route {
        name: "tool_detail",
        upstream_path: None,
        query: QueryMode::Forward,
        inject_command_defaults: false,
    };
    pub const SCHEMA: Route = Route {
        name: "schema",
        upstream_path: None,
        query: QueryMode::Forward,
        inject_command_defaults: false,
    };
    pub const COMMAND: Route = Route {
        name: "command",
        upstream_path: None,
        query: QueryMode::Drop,
        inject_command_defaults: true,
    };
    pub const OPENAI_FUNCTIONS: Route = Route {
        name: "openai_functions",
        upstream_path: Some("/tools"),
        query: QueryMode::Fixed("?includeSchema=true"),
        inject_command_defaults: false,
    };
}

/// An inbound request as delivered by the route dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    pub method: Method,
    /// Path with any proxy prefix already stripped, e.g. `/tools/abc`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub body: Option<Value>,
}

impl InboundRequest {
    pub fn get(path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: None,
            body,
        }
    }
}

#[derive(Clone)]
pub struct Forwarder {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
}

impl Forwarder {
    pub fn new(store: Arc<dyn CredentialStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Forward one inbound request and classify the outcome.
    ///
    /// Credentials are read from the store on every call. No call is issued
    /// while the API key is missing.
    pub async fn forward(&self, route: &Route, inbound: &InboundRequest) -> NormalizedResult {
        let target = match self.store.target() {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(route = route.name, "no NetPad API key configured");
                return NormalizedResult::auth_error(
                    401,
                    json!("No NetPad API key is configured for this proxy"),
                );
            }
            Err(e) => {
                error!(error = %e, route = route.name, "failed to read credential store");
                return NormalizedResult::config_error(e.to_string());
            }
        };

        let call = build_call(route, inbound, &target);
        debug!(
            route = route.name,
            method = %call.method,
            url = %call.url,
            "forwarding to NetPad"
        );

        let outcome = self.transport.send(call).await;
        normalize(outcome, target.base_url_trimmed())
    }
}

/// Build the outbound call for `inbound` against `target`.
pub fn build_call(
    route: &Route,
    inbound: &InboundRequest,
    target: &UpstreamTarget,
) -> OutboundCall {
    let path = route.upstream_path.unwrap_or(inbound.path.as_str());
    let query = match route.query {
        QueryMode::Drop => String::new(),
        QueryMode::Fixed(q) => q.to_string(),
        QueryMode::Forward => match inbound.query.as_deref() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        },
    };
    let url = format!(
        "{}{}{}{}",
        target.base_url_trimmed(),
        UPSTREAM_API_PREFIX,
        path,
        query
    );

    let body = if route.inject_command_defaults {
        Some(inject_command_defaults(inbound.body.as_ref(), &target.api_key))
    } else {
        inbound.body.clone()
    };

    OutboundCall {
        method: inbound.method,
        url,
        headers: vec![(API_KEY_HEADER, target.api_key.clone())],
        body,
    }
}

/// Fill in `auth.apiKey` and `clientInfo` for a command body.
///
/// Existing values are kept as-is; a JSON `null` counts as absent. Bodies
/// that are not JSON objects are returned unchanged.
pub fn inject_command_defaults(body: Option<&Value>, api_key: &str) -> Value {
    let mut obj = match body {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(obj)) => obj.clone(),
        Some(other) => return other.clone(),
    };

    match obj.get_mut("auth") {
        None | Some(Value::Null) => {
            obj.insert("auth".to_string(), json!({ "apiKey": api_key }));
        }
        Some(Value::Object(auth)) => {
            if auth.get("apiKey").map_or(true, Value::is_null) {
                auth.insert("apiKey".to_string(), json!(api_key));
            }
        }
        Some(_) => {}
    }

    if obj.get("clientInfo").map_or(true, Value::is_null) {
        obj.insert(
            "clientInfo".to_string(),
            json!({ "clientId": CLIENT_ID, "platform": CLIENT_PLATFORM }),
        );
    }

    Value::Object(obj)
}
