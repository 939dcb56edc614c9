//! Execution trajectories - the append-only record of one agent run.
//!
//! Each loop iteration appends exactly one `Turn`. Turns are never mutated
//! after being appended; the trajectory is frozen into the final result when
//! the loop terminates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What came back from acting on a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observation {
    /// Tool executed and returned a value (stringified for the model).
    Success(String),
    /// The turn failed: unknown tool, bad arguments, or a tool that raised.
    /// The failure is folded into context instead of aborting the loop.
    Error(String),
    /// The decision call or the tool ran past its per-turn deadline.
    Timeout,
}

impl Observation {
    /// Render the observation the way it is shown to the model.
    pub fn as_text(&self) -> String {
        match self {
            Observation::Success(s) => s.clone(),
            Observation::Error(e) => format!("Error: {}", e),
            Observation::Timeout => "Error: timed out".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Observation::Success(_))
    }
}

/// One reason-act-observe iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Zero-based position in the trajectory.
    pub index: usize,
    /// The model's reasoning for this turn (may be empty on a timed-out turn).
    pub thought: String,
    /// Name of the tool the model chose (empty when the decision itself
    /// timed out and no action was taken).
    pub tool_name: String,
    /// Arguments as supplied by the model, before validation.
    pub tool_args: Value,
    pub observation: Observation,
}

/// Ordered, append-only sequence of turns for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    turns: Vec<Turn>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning it the next contiguous index.
    pub fn push(
        &mut self,
        thought: String,
        tool_name: String,
        tool_args: Value,
        observation: Observation,
    ) -> &Turn {
        let index = self.turns.len();
        self.turns.push(Turn {
            index,
            thought,
            tool_name,
            tool_args,
            observation,
        });
        &self.turns[index]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent successful observation, if any turn produced one.
    pub fn last_success(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|t| match &t.observation {
            Observation::Success(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Render the trajectory as context for the next decision.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(&format!(
                "[{}] thought: {}\n    action: {}({})\n    observation: {}\n",
                turn.index,
                turn.thought,
                if turn.tool_name.is_empty() {
                    "(none)"
                } else {
                    &turn.tool_name
                },
                turn.tool_args,
                turn.observation.as_text()
            ));
        }
        out
    }
}
