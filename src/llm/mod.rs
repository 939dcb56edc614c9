//! Model-decision capability - the external reasoning function consumed by
//! the loop engine each turn.
//!
//! The engine never produces natural-language reasoning itself; it hands the
//! full decision context (instruction, input record, tool descriptors,
//! trajectory so far) to a `DecisionModel` and receives back exactly one of
//! two decision kinds: call a tool, or finish with output values. Content is
//! non-deterministic, shape is not.

mod error;
mod openrouter;

pub use error::{classify_http_status, ModelError, RetryConfig};
pub use openrouter::OpenRouterModel;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::signature::{FieldSpec, Record};
use crate::tools::ToolDescriptor;

/// One structured decision returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Invoke a named tool with JSON arguments.
    ToolCall {
        thought: String,
        tool: String,
        args: Value,
    },
    /// Stop and emit output field values.
    Finish { thought: String, outputs: Record },
}

impl Decision {
    /// Convenience constructor for a tool-call decision.
    pub fn call(thought: impl Into<String>, tool: impl Into<String>, args: Value) -> Self {
        Decision::ToolCall {
            thought: thought.into(),
            tool: tool.into(),
            args,
        }
    }

    /// Convenience constructor for a finish decision.
    pub fn finish(thought: impl Into<String>, outputs: Record) -> Self {
        Decision::Finish {
            thought: thought.into(),
            outputs,
        }
    }
}

/// Everything the model sees when making one decision.
///
/// Borrowed views into the engine's state; the model must not need anything
/// beyond this to decide (no ambient globals).
pub struct DecisionRequest<'a> {
    /// The agent's task instruction.
    pub instruction: &'a str,
    /// Declared input fields with their current values.
    pub inputs: &'a Record,
    pub input_fields: &'a [FieldSpec],
    /// Declared output fields the finish decision must populate.
    pub output_fields: &'a [FieldSpec],
    /// Descriptors of every callable tool, in registry order. The implicit
    /// "finish" action is always available in addition to these.
    pub tools: &'a [ToolDescriptor],
    /// Rendered trajectory of prior turns.
    pub trajectory: &'a str,
}

/// Trait for decision-capability backends.
#[async_trait]
pub trait DecisionModel: Send + Sync {
    /// Produce the next decision for the given context.
    ///
    /// # Errors
    /// A `ModelError` from this method is a capability-level failure and is
    /// the only error kind the loop engine propagates to its caller.
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, ModelError>;
}

/// Deterministic scripted model for tests.
///
/// Returns pre-recorded decisions in FIFO order; an exhausted script is a
/// capability failure. Each entry may carry a delay so per-turn timeout
/// behavior can be exercised.
pub struct ScriptedModel {
    script: Mutex<std::collections::VecDeque<(Option<Duration>, Decision)>>,
}

impl ScriptedModel {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            script: Mutex::new(decisions.into_iter().map(|d| (None, d)).collect()),
        }
    }

    /// Append a decision that is delayed before being returned.
    pub fn push_delayed(&self, delay: Duration, decision: Decision) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back((Some(delay), decision));
    }

    /// Append a decision.
    pub fn push(&self, decision: Decision) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back((None, decision));
    }

    /// Decisions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock poisoned").len()
    }
}

#[async_trait]
impl DecisionModel for ScriptedModel {
    async fn decide(&self, _request: DecisionRequest<'_>) -> Result<Decision, ModelError> {
        let entry = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match entry {
            Some((Some(delay), decision)) => {
                tokio::time::sleep(delay).await;
                Ok(decision)
            }
            Some((None, decision)) => Ok(decision),
            None => Err(ModelError::Parse(
                "scripted model exhausted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_request_parts() -> (Record, Vec<FieldSpec>, Vec<FieldSpec>, Vec<ToolDescriptor>) {
        (Record::new(), Vec::new(), Vec::new(), Vec::new())
    }

    #[tokio::test]
    async fn test_scripted_model_is_fifo() {
        let model = ScriptedModel::new(vec![
            Decision::call("first", "add_numbers", json!({"a": 1, "b": 2})),
            Decision::finish("second", Record::new()),
        ]);

        let (inputs, input_fields, output_fields, tools) = empty_request_parts();
        let request = || DecisionRequest {
            instruction: "",
            inputs: &inputs,
            input_fields: &input_fields,
            output_fields: &output_fields,
            tools: &tools,
            trajectory: "",
        };

        assert!(matches!(
            model.decide(request()).await.unwrap(),
            Decision::ToolCall { tool, .. } if tool == "add_numbers"
        ));
        assert!(matches!(
            model.decide(request()).await.unwrap(),
            Decision::Finish { .. }
        ));
        assert!(model.decide(request()).await.is_err());
    }
}
