//! Arithmetic tools for the math specialist.

use async_trait::async_trait;
use serde_json::Value;

use super::{ParamSpec, Tool};
use crate::agent::RunContext;
use crate::signature::FieldType;

fn number_arg(args: &Value, name: &str) -> anyhow::Result<f64> {
    args[name]
        .as_f64()
        .ok_or_else(|| anyhow::anyhow!("Missing numeric argument '{}'", name))
}

/// Add two numbers together.
pub struct AddNumbers;

#[async_trait]
impl Tool for AddNumbers {
    fn name(&self) -> &str {
        "add_numbers"
    }

    fn description(&self) -> &str {
        "Add two numbers together and return the sum."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("a", FieldType::Number, "First addend"),
            ParamSpec::required("b", FieldType::Number, "Second addend"),
        ]
    }

    fn return_type(&self) -> FieldType {
        FieldType::Number
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let a = number_arg(&args, "a")?;
        let b = number_arg(&args, "b")?;
        Ok(Value::from(a + b))
    }
}

/// Multiply two numbers together.
pub struct MultiplyNumbers;

#[async_trait]
impl Tool for MultiplyNumbers {
    fn name(&self) -> &str {
        "multiply_numbers"
    }

    fn description(&self) -> &str {
        "Multiply two numbers together and return the product."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("a", FieldType::Number, "First factor"),
            ParamSpec::required("b", FieldType::Number, "Second factor"),
        ]
    }

    fn return_type(&self) -> FieldType {
        FieldType::Number
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let a = number_arg(&args, "a")?;
        let b = number_arg(&args, "b")?;
        Ok(Value::from(a * b))
    }
}
