use serde::{Deserialize, Serialize};

/// Definition of a tool the model can call, in canonical (`OpenAI`) shape
///
/// Deserialization accepts every shape the tool normalizer understands
/// (canonical, Anthropic, flat), so callers can pass vendor-shaped tools
/// straight through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Name, description and parameter schema
    pub function: FunctionDefinition,
}

/// Callable function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Build a canonical function tool
    pub fn function(name: impl Into<String>, description: Option<String>, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.function.name
    }
}
