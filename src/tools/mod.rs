//! Tool system for the loop engine.
//!
//! Tools are a closed polymorphic set: each tool carries a data-level
//! descriptor (name, typed parameters, return type) plus an async invocation
//! capability. The registry keys tools by name, preserves registration order,
//! and performs typed argument validation *before* execution so that a bad
//! decision is distinguishable from a tool that failed while running.

pub mod math;
pub mod text;
pub mod time;
pub mod weather;

pub use math::{AddNumbers, MultiplyNumbers};
pub use text::{CountWords, ReverseText};
pub use time::{GetChinaTime, GetUsaTime};
pub use weather::{CompareCityTemperatures, GetWeatherByCity};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::agent::RunContext;
use crate::signature::FieldType;

/// Errors from resolving or invoking a tool.
///
/// `UnknownTool` and `InvalidArguments` are detected before execution;
/// `ExecutionFailed` wraps a failure raised by the tool body. The loop engine
/// records all three as observations rather than propagating them.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
}

/// One declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub description: String,
    pub required: bool,
    /// Value substituted when an optional parameter is omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(
        name: impl Into<String>,
        ty: FieldType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// An optional parameter with a default.
    pub fn optional(
        name: impl Into<String>,
        ty: FieldType,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: false,
            default: Some(default),
        }
    }
}

/// Data-level contract of a tool, shown to the decision step every turn.
///
/// # Invariant
/// Stable for the lifetime of the registry it lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub return_type: FieldType,
}

impl ToolDescriptor {
    /// JSON-schema-shaped parameter block for model-facing serialization.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.ty.to_string(),
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Trait for implementing tools.
///
/// The descriptor parts (`name`, `description`, `parameters`, `return_type`)
/// must return the same values for the lifetime of the tool; the registry
/// snapshots them at registration.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// Declared parameters, in order.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Declared return type.
    fn return_type(&self) -> FieldType;

    /// Execute the tool with validated arguments.
    ///
    /// The context is passed through so nested-agent tools can run their
    /// inner loop with the caller's model capability; leaf tools ignore it.
    async fn execute(&self, args: Value, ctx: &RunContext) -> anyhow::Result<Value>;
}

/// Registry of tools available to one agent instance.
///
/// Fixed after construction: agents take the registry by value and never
/// mutate it. Registration order is preserved because descriptors are part
/// of the prompt shown to the model each turn.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, snapshotting its descriptor.
    ///
    /// # Errors
    /// Returns `ToolError::DuplicateTool` if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        let descriptor = ToolDescriptor {
            name: name.clone(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
            return_type: tool.return_type(),
        };
        self.index.insert(name, self.tools.len());
        self.descriptors.push(descriptor);
        self.tools.push(tool);
        Ok(())
    }

    /// Resolve a tool name to its descriptor.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// All descriptors, in registration order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and normalize arguments, then execute the tool.
    ///
    /// Validation failures come back as `UnknownTool`/`InvalidArguments`
    /// without the tool ever running; failures raised by the tool body come
    /// back as `ExecutionFailed`.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Value,
        ctx: &RunContext,
    ) -> Result<Value, ToolError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let normalized = validate_args(&self.descriptors[idx], args)?;

        tracing::debug!(tool = name, "Invoking tool");
        self.tools[idx]
            .execute(normalized, ctx)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &self.descriptors.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Check supplied arguments against a descriptor, applying defaults.
///
/// Accepts `null` in place of an empty object for zero-parameter tools.
pub fn validate_args(descriptor: &ToolDescriptor, args: &Value) -> Result<Value, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: descriptor.name.clone(),
        reason,
    };

    let supplied: Map<String, Value> = match args {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(invalid(format!(
                "expected an argument object, got {}",
                other
            )))
        }
    };

    for key in supplied.keys() {
        if !descriptor.parameters.iter().any(|p| &p.name == key) {
            return Err(invalid(format!("unexpected argument '{}'", key)));
        }
    }

    let mut normalized = Map::new();
    for param in &descriptor.parameters {
        match supplied.get(&param.name) {
            Some(value) if param.ty.matches(value) => {
                normalized.insert(param.name.clone(), value.clone());
            }
            Some(value) => {
                return Err(invalid(format!(
                    "parameter '{}' expects {}, got {}",
                    param.name, param.ty, value
                )));
            }
            None if param.required => {
                return Err(invalid(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            None => {
                if let Some(default) = &param.default {
                    normalized.insert(param.name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(normalized))
}

/// Render a tool return value the way it is folded back into context.
pub fn stringify_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(AddNumbers)).unwrap();
        registry.register(Arc::new(MultiplyNumbers)).unwrap();
        registry
    }

    fn test_ctx() -> RunContext {
        RunContext::new(Arc::new(ScriptedModel::new(Vec::new())))
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let registry = registry();
        assert_eq!(registry.resolve("add_numbers").unwrap().name, "add_numbers");
        assert_eq!(
            registry.resolve("multiply_numbers").unwrap().name,
            "multiply_numbers"
        );
        assert!(matches!(
            registry.resolve("divide_numbers"),
            Err(ToolError::UnknownTool(name)) if name == "divide_numbers"
        ));
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = registry();
        let names: Vec<_> = registry
            .descriptors()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["add_numbers", "multiply_numbers"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(Arc::new(AddNumbers)),
            Err(ToolError::DuplicateTool(name)) if name == "add_numbers"
        ));
    }

    #[test]
    fn test_validate_args_missing_required() {
        let registry = registry();
        let descriptor = registry.resolve("add_numbers").unwrap();
        let err = validate_args(descriptor, &json!({"a": 5})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_validate_args_wrong_type() {
        let registry = registry();
        let descriptor = registry.resolve("add_numbers").unwrap();
        let err = validate_args(descriptor, &json!({"a": 5, "b": "three"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_validate_args_rejects_unexpected_key() {
        let registry = registry();
        let descriptor = registry.resolve("add_numbers").unwrap();
        let err = validate_args(descriptor, &json!({"a": 5, "b": 3, "c": 1})).unwrap_err();
        assert!(err.to_string().contains("'c'"));
    }

    #[test]
    fn test_validate_args_applies_default() {
        let descriptor = ToolDescriptor {
            name: "search".into(),
            description: "test".into(),
            parameters: vec![
                ParamSpec::required("query", FieldType::String, "q"),
                ParamSpec::optional("limit", FieldType::Number, "n", json!(5)),
            ],
            return_type: FieldType::String,
        };
        let normalized = validate_args(&descriptor, &json!({"query": "rust"})).unwrap();
        assert_eq!(normalized["limit"], json!(5));
    }

    #[test]
    fn test_validate_args_null_for_zero_param_tool() {
        let descriptor = ToolDescriptor {
            name: "get_usa_time".into(),
            description: "test".into(),
            parameters: vec![],
            return_type: FieldType::String,
        };
        assert!(validate_args(&descriptor, &Value::Null).is_ok());
    }

    #[tokio::test]
    async fn test_invoke_runs_tool() {
        let registry = registry();
        let ctx = test_ctx();
        let result = registry
            .invoke("add_numbers", &json!({"a": 5, "b": 3}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!(8.0));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = registry();
        let ctx = test_ctx();
        let err = registry.invoke("nope", &json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[test]
    fn test_parameters_schema_shape() {
        let registry = registry();
        let schema = registry.resolve("add_numbers").unwrap().parameters_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["a"]["type"], json!("number"));
        assert!(schema["required"].as_array().unwrap().contains(&json!("a")));
    }

    #[test]
    fn test_stringify_output() {
        assert_eq!(stringify_output(&json!("8")), "8");
        assert_eq!(stringify_output(&json!(8)), "8");
        assert_eq!(stringify_output(&json!({"x": 1})), "{\"x\":1}");
    }
}
