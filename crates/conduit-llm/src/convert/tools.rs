//! Tool definition normalization and tool-argument (de)serialization
//!
//! Tool definitions arrive in whatever shape the caller had at hand. They are
//! normalized to the canonical `OpenAI` shape on the way in and re-shaped for
//! each vendor on the way out.

use serde_json::{Map, Value, json};

use crate::error::{LlmError, ToolArgumentParseError};
use crate::protocol::anthropic::AnthropicTool;
use crate::types::{FunctionDefinition, ToolDefinition};

/// Schema substituted when a tool declares no parameters
pub fn default_input_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

impl TryFrom<Value> for ToolDefinition {
    type Error = LlmError;

    /// Accepts the canonical, Anthropic, and flat function shapes
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(LlmError::Validation(format!("tool definition must be an object, got {other}")));
            }
        };

        // Canonical: {type: "function", function: {...}}
        if let Some(Value::Object(function)) = object.remove("function") {
            return function_from_object(function);
        }

        // Anthropic ({type: "custom"|absent, input_schema}), flat function
        // ({type: "function", name, parameters}) and anything else naming
        // itself all carry their fields at the top level
        function_from_object(object)
    }
}

fn function_from_object(mut object: Map<String, Value>) -> Result<ToolDefinition, LlmError> {
    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => {
            return Err(LlmError::Validation(format!(
                "tool definition has no name: {}",
                Value::Object(object)
            )));
        }
    };

    let description = match object.remove("description") {
        Some(Value::String(description)) => Some(description),
        _ => None,
    };

    let parameters = object
        .remove("parameters")
        .or_else(|| object.remove("input_schema"))
        .filter(Value::is_object)
        .unwrap_or_else(default_input_schema);

    Ok(ToolDefinition::function(name, description, parameters))
}

/// Tools in the Anthropic `custom` shape
pub fn to_anthropic_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            tool_type: "custom".to_owned(),
            name: tool.function.name.clone(),
            description: tool.function.description.clone().unwrap_or_default(),
            input_schema: tool.function.parameters.clone(),
        })
        .collect()
}

/// Tools for the modern `tools` request field
pub fn to_openai_tools(tools: &[ToolDefinition]) -> Vec<ToolDefinition> {
    tools.to_vec()
}

/// Tools for the legacy `functions` request field
pub fn to_openai_functions(tools: &[ToolDefinition]) -> Vec<FunctionDefinition> {
    tools.iter().map(|tool| tool.function.clone()).collect()
}

/// Parse a canonical arguments string into the object vendors expect
///
/// Never fails: invalid JSON and non-object values degrade to `{}`.
pub fn parse_arguments(arguments: &str) -> Value {
    match try_parse_arguments(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!(kind = json_kind(&other), "tool arguments are not an object, using {{}}");
            Value::Object(Map::new())
        }
        Err(e) => {
            tracing::warn!(error = %e, "using {{}} for unparseable tool arguments");
            Value::Object(Map::new())
        }
    }
}

fn try_parse_arguments(arguments: &str) -> Result<Value, ToolArgumentParseError> {
    Ok(serde_json::from_str(arguments)?)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serialize parsed arguments back into the canonical JSON string
pub fn serialize_arguments(arguments: &Value) -> String {
    // Serializing a `Value` cannot fail
    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_owned())
}
