//! Nested-agent adapter: an agent exposed as a tool.
//!
//! The wrapped agent's input fields become the tool's parameters and its
//! primary output becomes the tool's return value. The caller sees a single
//! call-and-result; the inner run's trajectory stays inside the inner agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Agent, RunContext};
use crate::signature::{FieldType, Record};
use crate::tools::{ParamSpec, Tool};

/// Tool wrapper around an agent.
pub struct AgentTool {
    agent: Arc<Agent>,
}

impl AgentTool {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        &self.agent.signature().instruction
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        self.agent
            .signature()
            .inputs
            .iter()
            .map(|f| ParamSpec::required(&f.name, f.ty, &f.description))
            .collect()
    }

    fn return_type(&self) -> FieldType {
        self.agent.signature().primary_output().ty
    }

    async fn execute(&self, args: Value, ctx: &RunContext) -> anyhow::Result<Value> {
        let input: Record = match args {
            Value::Object(map) => map,
            Value::Null => Record::new(),
            other => anyhow::bail!("Expected an object argument, got {}", other),
        };

        tracing::debug!(agent = %self.agent.name(), "Dispatching to nested agent");
        let result = self.agent.run(input, ctx).await?;
        for warning in &result.warnings {
            tracing::warn!(agent = %self.agent.name(), "{}", warning);
        }
        Ok(result.primary_output().clone())
    }
}
