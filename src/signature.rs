//! Task signatures - typed input/output contracts for agents.
//!
//! A `Signature` binds a free-text instruction to named, typed input and
//! output fields. The loop engine validates input records against it before
//! running and coerces finish decisions into well-typed output records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A JSON record keyed by field name.
pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Signature must declare at least one output field")]
    NoOutputs,
}

/// The closed set of field types known to both the engine and the
/// model-facing serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Structured record (arbitrary JSON object).
    Object,
}

impl FieldType {
    /// Check whether a JSON value inhabits this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
        }
    }

    /// The empty/zero value used when a field must be filled best-effort.
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Number => Value::from(0),
            FieldType::Boolean => Value::Bool(false),
            FieldType::Object => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Object => write!(f, "object"),
        }
    }
}

/// A single named, typed field with a description shown to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
        }
    }
}

/// Typed input/output contract plus task instruction for one agent.
///
/// # Invariants
/// - Field names are unique across inputs and across outputs
/// - At least one output field is declared (the first one is the agent's
///   primary output, exposed when the agent is wrapped as a tool)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Short identifier for the task (also the tool name when wrapped).
    pub name: String,
    /// Free-text instruction describing the task and when to invoke it.
    pub instruction: String,
    pub inputs: Vec<FieldSpec>,
    pub outputs: Vec<FieldSpec>,
}

impl Signature {
    /// Start building a signature.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an input field.
    pub fn input(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.inputs.push(FieldSpec::new(name, ty, description));
        self
    }

    /// Add an output field. The first output added is the primary output.
    pub fn output(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.outputs.push(FieldSpec::new(name, ty, description));
        self
    }

    /// Validate the structural invariants (unique names, non-empty outputs).
    pub fn validate(&self) -> Result<(), SignatureError> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.inputs {
            if !seen.insert(field.name.as_str()) {
                return Err(SignatureError::DuplicateField(field.name.clone()));
            }
        }
        seen.clear();
        for field in &self.outputs {
            if !seen.insert(field.name.as_str()) {
                return Err(SignatureError::DuplicateField(field.name.clone()));
            }
        }
        if self.outputs.is_empty() {
            return Err(SignatureError::NoOutputs);
        }
        Ok(())
    }

    /// The primary output field (first declared).
    ///
    /// # Panics
    /// Never panics on a validated signature (`validate` rejects empty outputs).
    pub fn primary_output(&self) -> &FieldSpec {
        &self.outputs[0]
    }

    /// Check an input record against the declared input fields.
    ///
    /// Every declared field must be present with a matching type; extra
    /// fields are rejected so callers notice contract drift.
    pub fn check_input(&self, record: &Record) -> Result<(), String> {
        for field in &self.inputs {
            match record.get(&field.name) {
                None => return Err(format!("Missing input field '{}'", field.name)),
                Some(value) if !field.ty.matches(value) => {
                    return Err(format!(
                        "Input field '{}' expects {}, got {}",
                        field.name,
                        field.ty,
                        type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }
        for key in record.keys() {
            if !self.inputs.iter().any(|f| &f.name == key) {
                return Err(format!("Unknown input field '{}'", key));
            }
        }
        Ok(())
    }

    /// Coerce a finish decision's output values into a well-typed record.
    ///
    /// Missing or mistyped fields are filled with their type's empty value
    /// and a warning is recorded; the result is always complete. Extra keys
    /// the signature does not declare are dropped.
    pub fn coerce_outputs(&self, mut supplied: Record) -> (Record, Vec<String>) {
        let mut outputs = Record::new();
        let mut warnings = Vec::new();

        for field in &self.outputs {
            match supplied.remove(&field.name) {
                Some(value) if field.ty.matches(&value) => {
                    outputs.insert(field.name.clone(), value);
                }
                Some(value) => {
                    warnings.push(format!(
                        "Output field '{}' expected {} but got {}; replaced with default",
                        field.name,
                        field.ty,
                        type_name(&value)
                    ));
                    outputs.insert(field.name.clone(), field.ty.default_value());
                }
                None => {
                    warnings.push(format!(
                        "Output field '{}' missing from finish decision; filled with default",
                        field.name
                    ));
                    outputs.insert(field.name.clone(), field.ty.default_value());
                }
            }
        }

        if !supplied.is_empty() {
            let extras: Vec<_> = supplied.keys().cloned().collect();
            warnings.push(format!(
                "Finish decision carried undeclared output fields: {}",
                extras.join(", ")
            ));
        }

        (outputs, warnings)
    }
}

/// Human-readable JSON type name for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
