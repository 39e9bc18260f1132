//! Tool System
//!
//! Named, schema-validated operations the model may ask the loop to invoke.
//! Tools are registered at startup and looked up by name during dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

fn new_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID, echoed back on the matching result
    #[serde(default = "new_call_id")]
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCall {
    /// Create a call with a freshly generated ID
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            id: new_call_id(),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }

    pub fn i64_arg(&self, name: &str) -> Option<i64> {
        self.arguments.get(name).and_then(as_integer)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID this result answers
    pub id: String,

    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output text (success payload or error message)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            success: false,
            output: error.into(),
            data: None,
        }
    }

    /// Successful result whose text output is the JSON rendering of `data`
    pub fn json(name: impl Into<String>, data: Value) -> Self {
        Self::success(name, data.to_string()).with_data(data)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Accept values outside `enum_values`; the handler normalizes them
    #[serde(default)]
    pub lenient: bool,

    /// Inclusive lower bound for integers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,

    /// Inclusive upper bound for integers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
}

impl ParameterSchema {
    fn json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.param_type));
        prop.insert("description".into(), json!(self.description));
        if let Some(values) = &self.enum_values {
            prop.insert("enum".into(), json!(values));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), json!(max));
        }
        Value::Object(prop)
    }

    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "integer" => as_integer(value).is_some(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !type_ok {
            return Err(format!("'{}' must be of type {}, got {value}", self.name, self.param_type));
        }

        if let Some(n) = as_integer(value).filter(|_| self.param_type == "integer") {
            if self.minimum.is_some_and(|min| n < min) || self.maximum.is_some_and(|max| n > max) {
                return Err(format!(
                    "'{}' must be between {} and {}, got {n}",
                    self.name,
                    self.minimum.map_or_else(|| "-inf".into(), |v| v.to_string()),
                    self.maximum.map_or_else(|| "inf".into(), |v| v.to_string()),
                ));
            }
        }

        if let Some(allowed) = self.enum_values.as_ref().filter(|_| !self.lenient) {
            if !allowed.contains(value) {
                return Err(format!("'{}' must be one of {}", self.name, Value::Array(allowed.clone())));
            }
        }

        Ok(())
    }
}

/// JSON integers, plus whole floats (`5.0`) and numeric strings (`"5"`) that
/// smaller models tend to emit
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON Schema object describing the parameters
    pub fn parameters_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check call arguments against the parameter definitions
    pub fn validate(&self, arguments: &HashMap<String, Value>) -> Result<()> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolArgumentInvalid(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) => param.check(value).map_err(AgentError::ToolArgumentInvalid)?,
            }
        }

        Ok(())
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already-validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        self.schema().validate(&call.arguments)
    }
}

/// Registry for available tools, keyed by tool name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Look up, validate, then execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;

        tool.execute(call).await
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "lookup".into(),
                description: "Look something up".into(),
                parameters: vec![
                    ParameterSchema {
                        name: "query".into(),
                        param_type: "string".into(),
                        description: "What to look up".into(),
                        required: true,
                        ..Default::default()
                    },
                    ParameterSchema {
                        name: "size".into(),
                        param_type: "string".into(),
                        description: "Result size".into(),
                        enum_values: Some(vec![json!("small"), json!("large")]),
                        ..Default::default()
                    },
                    ParameterSchema {
                        name: "tier".into(),
                        param_type: "string".into(),
                        description: "Advisory tier".into(),
                        enum_values: Some(vec![json!("low"), json!("high")]),
                        lenient: true,
                        ..Default::default()
                    },
                    ParameterSchema {
                        name: "limit".into(),
                        param_type: "integer".into(),
                        description: "Max results".into(),
                        default: Some(json!(5)),
                        minimum: Some(1),
                        maximum: Some(50),
                        ..Default::default()
                    },
                ],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let query = call.str_arg("query").unwrap_or_default();
            Ok(ToolResult::success("lookup", format!("found {query}")))
        }
    }

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(LookupTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("lookup").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.names(), vec!["lookup"]);
    }

    #[test]
    fn test_validation_rules() {
        let schema = LookupTool.schema();

        assert!(schema.validate(&args(&[("query", json!("sushi"))])).is_ok());
        assert!(schema.validate(&args(&[("query", json!("sushi")), ("limit", json!(5.0))])).is_ok());
        assert!(schema.validate(&args(&[("query", json!("sushi")), ("limit", json!("7"))])).is_ok());
        assert!(schema.validate(&args(&[("query", json!("sushi")), ("tier", json!("whatever"))])).is_ok());

        for bad in [
            args(&[]),
            args(&[("query", json!(42))]),
            args(&[("query", json!("x")), ("limit", json!(0))]),
            args(&[("query", json!("x")), ("limit", json!(51))]),
            args(&[("query", json!("x")), ("limit", json!("five"))]),
            args(&[("query", json!("x")), ("size", json!("medium"))]),
        ] {
            let err = schema.validate(&bad).unwrap_err();
            assert!(matches!(err, AgentError::ToolArgumentInvalid(_)), "{err}");
        }
    }

    #[test]
    fn test_parameters_json_schema() {
        let schema = LookupTool.schema().parameters_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["maximum"], 50);
        assert_eq!(schema["properties"]["size"]["enum"], json!(["small", "large"]));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("frobnicate", HashMap::new());
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "frobnicate"));
    }

    #[tokio::test]
    async fn test_execute_validates_first() {
        let mut registry = ToolRegistry::new();
        registry.register(LookupTool);

        let bad = ToolCall::new("lookup", args(&[("limit", json!(3))]));
        assert!(matches!(
            registry.execute(&bad).await,
            Err(AgentError::ToolArgumentInvalid(_))
        ));

        let good = ToolCall::new("lookup", args(&[("query", json!("ramen"))]));
        let result = registry.execute(&good).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "found ramen");
    }

    #[test]
    fn test_tool_call_id_generated_when_missing() {
        let call: ToolCall = serde_json::from_value(json!({"name": "lookup"})).unwrap();
        assert!(!call.id.is_empty());
        assert!(call.arguments.is_empty());
    }
}
