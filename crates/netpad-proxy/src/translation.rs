//! NetPad -> OpenAI function-calling translation.
//!
//! NetPad describes its tools as
//! `{invoke | internalName, description, parameters: {properties, required}}`.
//! OpenAI-compatible clients expect
//! `{type: "function", function: {name, description, parameters: {type: "object", ...}}}`.
//!
//! Translation is total and order-preserving. Upstream entries are read as
//! raw JSON so malformed tools still translate best-effort instead of failing
//! the whole list.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    pub parameters: FunctionParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: Map<String, Value>,
    pub required: Value,
}

/// A single translated property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    pub description: Value,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Pull the tool array out of a NetPad tool-list body.
///
/// NetPad answers either with a bare array or with `{ "tools": [...] }`.
pub fn extract_tool_list(body: &Value) -> &[Value] {
    match body {
        Value::Array(tools) => tools,
        Value::Object(obj) => obj
            .get("tools")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

pub fn translate_tools(tools: &[Value]) -> Vec<FunctionDescriptor> {
    tools.iter().map(translate_tool).collect()
}

pub fn translate_tool(tool: &Value) -> FunctionDescriptor {
    let params = tool.get("parameters");

    let properties = params
        .and_then(|p| p.get("properties"))
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(key, prop)| (key.clone(), translate_property(key, prop)))
                .collect()
        })
        .unwrap_or_default();

    let required = params
        .and_then(|p| p.get("required"))
        .filter(|r| !r.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    FunctionDescriptor {
        kind: "function",
        function: FunctionSpec {
            name: tool_name(tool),
            description: present(tool.get("description")),
            parameters: FunctionParameters {
                kind: "object",
                properties,
                required,
            },
        },
    }
}

/// `invoke` when it is a non-empty string, otherwise `internalName`.
fn tool_name(tool: &Value) -> String {
    let invoke = tool
        .get("invoke")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    invoke
        .or_else(|| tool.get("internalName").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// `type`, `enum` and `default` are copied whenever the key exists, even
/// when the value is `null`, `false` or `0`. Only a missing or `null`
/// description falls back to the property key.
fn translate_property(key: &str, prop: &Value) -> Value {
    let schema = PropertySchema {
        kind: prop.get("type").cloned(),
        description: present(prop.get("description"))
            .unwrap_or_else(|| Value::String(key.to_string())),
        enum_values: prop.get("enum").cloned(),
        default: prop.get("default").cloned(),
    };
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translates_internal_name_tool() {
        let tool = json!({
            "internalName": "search",
            "description": "Find items",
            "parameters": {
                "properties": {"q": {"type": "string"}},
                "required": ["q"]
            }
        });

        let out = serde_json::to_value(translate_tool(&tool)).unwrap();
        assert_eq!(out["type"], "function");
        assert_eq!(out["function"]["name"], "search");
        assert_eq!(out["function"]["description"], "Find items");
        assert_eq!(out["function"]["parameters"]["type"], "object");
        assert_eq!(
            out["function"]["parameters"]["properties"]["q"],
            json!({"type": "string", "description": "q"})
        );
        assert_eq!(out["function"]["parameters"]["required"], json!(["q"]));
    }

    #[test]
    fn prefers_non_empty_invoke() {
        let tool = json!({"invoke": "netpad_search", "internalName": "search"});
        assert_eq!(translate_tool(&tool).function.name, "netpad_search");

        let tool = json!({"invoke": "", "internalName": "search"});
        assert_eq!(translate_tool(&tool).function.name, "search");
    }

    #[test]
    fn keeps_falsy_defaults_and_enums() {
        let tool = json!({
            "internalName": "list",
            "parameters": {
                "properties": {
                    "archived": {"type": "boolean", "default": false},
                    "limit": {"type": "number", "description": "Max rows", "default": 0},
                    "sort": {"type": "string", "enum": ["asc", "desc"], "default": null}
                }
            }
        });

        let out = serde_json::to_value(translate_tool(&tool)).unwrap();
        let props = &out["function"]["parameters"]["properties"];
        assert_eq!(props["archived"]["default"], json!(false));
        assert_eq!(props["limit"]["default"], json!(0));
        assert_eq!(props["limit"]["description"], "Max rows");
        assert_eq!(props["sort"]["enum"], json!(["asc", "desc"]));
        assert_eq!(props["sort"]["default"], Value::Null);
        assert!(props["sort"].as_object().unwrap().contains_key("default"));
        assert!(props["archived"].get("enum").is_none());
        assert_eq!(out["function"]["parameters"]["required"], json!([]));
    }

    #[test]
    fn null_default_is_copied_but_missing_default_is_not() {
        let tool = json!({
            "internalName": "x",
            "parameters": {"properties": {
                "p": {"type": "string", "default": null},
                "q": {"type": "string"}
            }}
        });

        let out = serde_json::to_value(translate_tool(&tool)).unwrap();
        let props = &out["function"]["parameters"]["properties"];
        assert_eq!(props["p"], json!({"type": "string", "description": "p", "default": null}));
        assert_eq!(props["q"], json!({"type": "string", "description": "q"}));
    }

    #[test]
    fn preserves_tool_and_property_order() {
        let tools = json!([
            {"internalName": "b", "parameters": {"properties": {"z": {}, "a": {}, "m": {}}}},
            {"internalName": "a"}
        ]);

        let out = translate_tools(extract_tool_list(&tools));
        let names: Vec<_> = out.iter().map(|f| f.function.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);

        let keys: Vec<_> = out[0].function.parameters.properties.keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn malformed_property_passes_through() {
        let tool = json!({
            "internalName": "x",
            "parameters": {"properties": {"p": {"description": "no type"}}}
        });
        let out = serde_json::to_value(translate_tool(&tool)).unwrap();
        assert_eq!(
            out["function"]["parameters"]["properties"]["p"],
            json!({"description": "no type"})
        );
    }

    #[test]
    fn extracts_wrapped_or_bare_lists() {
        let wrapped = json!({"success": true, "tools": [{"internalName": "a"}]});
        assert_eq!(extract_tool_list(&wrapped).len(), 1);
        assert_eq!(extract_tool_list(&json!([{}, {}])).len(), 2);
        assert!(extract_tool_list(&json!({"data": []})).is_empty());
        assert!(extract_tool_list(&json!("nope")).is_empty());
    }
}
