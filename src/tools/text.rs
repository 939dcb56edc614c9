//! Text processing tools for the text specialist.

use async_trait::async_trait;
use serde_json::Value;

use super::{ParamSpec, Tool};
use crate::agent::RunContext;
use crate::signature::FieldType;

fn text_arg(args: &Value) -> anyhow::Result<&str> {
    args["text"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing 'text' argument"))
}

/// Count whitespace-separated words.
pub struct CountWords;

#[async_trait]
impl Tool for CountWords {
    fn name(&self) -> &str {
        "count_words"
    }

    fn description(&self) -> &str {
        "Count the number of words in the given text."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "text",
            FieldType::String,
            "The text to count words in",
        )]
    }

    fn return_type(&self) -> FieldType {
        FieldType::Number
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let text = text_arg(&args)?;
        Ok(Value::from(text.split_whitespace().count()))
    }
}

/// Reverse text character by character.
pub struct ReverseText;

#[async_trait]
impl Tool for ReverseText {
    fn name(&self) -> &str {
        "reverse_text"
    }

    fn description(&self) -> &str {
        "Reverse the given text and return it backwards."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "text",
            FieldType::String,
            "The text to reverse",
        )]
    }

    fn return_type(&self) -> FieldType {
        FieldType::String
    }

    async fn execute(&self, args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        let text = text_arg(&args)?;
        Ok(Value::String(text.chars().rev().collect()))
    }
}
