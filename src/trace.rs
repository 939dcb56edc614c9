//! Run observers.
//!
//! An observer sees the lifecycle of a run: start with the input record, one
//! callback per completed turn, and the finished result with its wall time.
//! Nested runs report under their own agent name, so a coordinator trace
//! shows every specialist's turns too.

use std::time::Duration;

use crate::agent::RunResult;
use crate::signature::Record;
use crate::tools::stringify_output;
use crate::trajectory::Turn;

/// Observer over agent run lifecycles. All methods default to no-ops.
pub trait AgentObserver: Send + Sync {
    /// A run started with the given input record.
    fn on_start(&self, agent_name: &str, inputs: &Record) {
        let _ = (agent_name, inputs);
    }

    /// A turn completed (decision made, observation recorded).
    fn on_turn(&self, agent_name: &str, turn: &Turn) {
        let _ = (agent_name, turn);
    }

    /// A run finished, for whatever stop reason.
    fn on_finish(&self, agent_name: &str, result: &RunResult, elapsed: Duration) {
        let _ = (agent_name, result, elapsed);
    }
}

/// Observer that prints a human-readable transcript to stdout.
pub struct ConsoleTracer;

impl AgentObserver for ConsoleTracer {
    fn on_start(&self, agent_name: &str, inputs: &Record) {
        println!("\n{}", "=".repeat(60));
        println!("🤖 [{}] STARTED", agent_name);
        for (key, value) in inputs {
            println!("📥 Input: {} = {}", key, stringify_output(value));
        }
        println!("{}", "=".repeat(60));
    }

    fn on_turn(&self, agent_name: &str, turn: &Turn) {
        if !turn.thought.is_empty() {
            println!("💭 [{}] Thinking: {}", agent_name, turn.thought);
        }
        if !turn.tool_name.is_empty() {
            println!(
                "🔧 [{}] Action: {}({})",
                agent_name, turn.tool_name, turn.tool_args
            );
        }
        println!("📊 [{}] Result: {}", agent_name, turn.observation.as_text());
    }

    fn on_finish(&self, agent_name: &str, result: &RunResult, elapsed: Duration) {
        println!("✨ [{}] Final Answer: {}", agent_name, result.primary_text());
        println!("⏱️  [{}] Completed in {:.2}s", agent_name, elapsed.as_secs_f64());
        println!("✅ [{}] FINISHED\n", agent_name);
    }
}
