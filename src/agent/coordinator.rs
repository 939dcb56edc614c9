//! Coordinator over specialist agents.
//!
//! A coordinator is an ordinary agent whose registry holds only wrapped
//! specialists. Its instruction is synthesized from the specialists'
//! instructions, so the model knows what each one handles; which specialists
//! to call, and in what order, is entirely the model's decision.

use std::sync::Arc;

use serde_json::Value;

use super::{Agent, AgentTool, EngineError, RunContext, RunResult};
use crate::signature::{FieldType, Record, Signature};
use crate::tools::ToolRegistry;

const COORDINATOR_NAME: &str = "coordinator";

/// Multi-agent entry point: routes a user query across specialists.
pub struct Coordinator {
    agent: Agent,
}

impl Coordinator {
    /// Build a coordinator over the given specialists.
    ///
    /// # Errors
    /// Fails if two specialists share a name or the list is empty enough to
    /// make the synthesized signature invalid.
    pub fn new(specialists: Vec<Arc<Agent>>, max_iters: usize) -> Result<Self, EngineError> {
        let instruction = synthesize_instruction(&specialists);
        let signature = Signature::new(COORDINATOR_NAME, instruction)
            .input("user_query", FieldType::String, "The user's request")
            .output("final_answer", FieldType::String, "Complete answer to the request");

        let mut tools = ToolRegistry::new();
        for specialist in specialists {
            tools
                .register(Arc::new(AgentTool::new(specialist)))
                .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        }

        Ok(Self {
            agent: Agent::new(signature, tools, max_iters)?,
        })
    }

    /// Route one user query.
    pub async fn handle(&self, user_query: &str, ctx: &RunContext) -> Result<RunResult, EngineError> {
        let mut input = Record::new();
        input.insert("user_query".to_string(), Value::String(user_query.to_string()));
        self.agent.run(input, ctx).await
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

/// Build the coordinator instruction from the specialists' own instructions.
fn synthesize_instruction(specialists: &[Arc<Agent>]) -> String {
    let mut instruction = String::from(
        "You coordinate a team of specialist agents to answer the user's request. \
         Call the specialists whose expertise the request needs, in whatever order \
         makes sense, then combine their answers into one complete response.\n\n\
         Available specialists:\n",
    );
    for specialist in specialists {
        instruction.push_str(&format!(
            "- {}: {}\n",
            specialist.name(),
            specialist.signature().instruction
        ));
    }
    instruction
}
