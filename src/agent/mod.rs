//! The loop engine: one agent, one reason-act loop.
//!
//! An agent is a signature, a tool registry, and an iteration budget. Each
//! turn it hands the decision context to the model, validates and executes
//! the chosen tool, and folds the observation back into the trajectory.
//! Invalid decisions and tool failures become observations the model sees on
//! the next turn; only model-capability failures abort the run. Exhausting
//! the budget or being cancelled ends the run with best-effort outputs, not
//! an error.

mod adapter;
mod coordinator;

pub use adapter::AgentTool;
pub use coordinator::Coordinator;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::{Decision, DecisionModel, DecisionRequest, ModelError};
use crate::signature::{Record, Signature, SignatureError};
use crate::tools::{stringify_output, ToolError, ToolRegistry};
use crate::trace::AgentObserver;
use crate::trajectory::{Observation, Trajectory};

/// Unique identifier for an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hard failure of a run.
///
/// Everything else (bad decisions, tool errors, timeouts, budget exhaustion,
/// cancellation) is absorbed into the trajectory or the stop reason.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The decision capability failed after retries.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The agent's signature is structurally invalid.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The input record does not match the declared input fields.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Per-run dependencies and controls, passed explicitly into `Agent::run`.
///
/// The decision capability travels here rather than living in the agent, so
/// the same agent tree can run against different backends. Cloning is cheap;
/// nested runs receive the same context.
#[derive(Clone)]
pub struct RunContext {
    model: Arc<dyn DecisionModel>,
    observer: Option<Arc<dyn AgentObserver>>,
    cancel_token: Option<CancellationToken>,
    decision_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
}

impl RunContext {
    pub fn new(model: Arc<dyn DecisionModel>) -> Self {
        Self {
            model,
            observer: None,
            cancel_token: None,
            decision_timeout: None,
            tool_timeout: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Bound each model decision; an overrun consumes the iteration.
    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = Some(timeout);
        self
    }

    /// Bound each tool execution; an overrun consumes the iteration.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &Arc<dyn DecisionModel> {
        &self.model
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model issued a finish decision.
    Finished,
    /// The iteration budget ran out; outputs are best-effort.
    BudgetExhausted,
    /// The run was cancelled; outputs are best-effort.
    Cancelled,
}

/// Outcome of one run: output record, final reasoning, and the full
/// trajectory of turns that led there.
#[derive(Debug)]
pub struct RunResult {
    pub outputs: Record,
    /// Thought attached to the finish decision, if the run finished.
    pub reasoning: Option<String>,
    pub trajectory: Trajectory,
    pub warnings: Vec<String>,
    pub reason: StopReason,
    primary_field: String,
}

impl RunResult {
    /// Value of the primary output field.
    pub fn primary_output(&self) -> &Value {
        self.outputs.get(&self.primary_field).unwrap_or(&Value::Null)
    }

    /// Primary output rendered as plain text (strings unquoted).
    pub fn primary_text(&self) -> String {
        stringify_output(self.primary_output())
    }

    pub fn finished(&self) -> bool {
        self.reason == StopReason::Finished
    }
}

/// A reason-act agent: signature, tools, iteration budget.
pub struct Agent {
    id: AgentId,
    signature: Signature,
    tools: ToolRegistry,
    max_iters: usize,
}

impl Agent {
    /// Build an agent, validating the signature up front.
    pub fn new(
        signature: Signature,
        tools: ToolRegistry,
        max_iters: usize,
    ) -> Result<Self, EngineError> {
        signature.validate()?;
        Ok(Self {
            id: AgentId::new(),
            signature,
            tools,
            max_iters,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the reason-act loop to completion.
    ///
    /// # Errors
    /// `InvalidInput` if the input record does not match the signature;
    /// `Model` if the decision backend fails after retries. No other
    /// condition is an error.
    pub async fn run(&self, input: Record, ctx: &RunContext) -> Result<RunResult, EngineError> {
        self.signature
            .check_input(&input)
            .map_err(EngineError::InvalidInput)?;

        let start = Instant::now();
        tracing::debug!(agent = %self.name(), id = %self.id, max_iters = self.max_iters, "Run started");
        if let Some(observer) = &ctx.observer {
            observer.on_start(self.name(), &input);
        }

        let mut trajectory = Trajectory::new();

        for iteration in 0..self.max_iters {
            if ctx.is_cancelled() {
                tracing::info!(agent = %self.name(), iteration, "Run cancelled");
                return Ok(self.finish_early(
                    StopReason::Cancelled,
                    trajectory,
                    vec!["run cancelled before completion".to_string()],
                    ctx,
                    start,
                ));
            }

            let rendered = trajectory.render();
            let request = DecisionRequest {
                instruction: &self.signature.instruction,
                inputs: &input,
                input_fields: &self.signature.inputs,
                output_fields: &self.signature.outputs,
                tools: self.tools.descriptors(),
                trajectory: &rendered,
            };

            let decision = match self.decide(request, ctx).await? {
                Some(decision) => decision,
                None => {
                    // Decision timed out; record the lost turn and move on.
                    let turn =
                        trajectory.push(String::new(), String::new(), Value::Null, Observation::Timeout);
                    if let Some(observer) = &ctx.observer {
                        observer.on_turn(self.name(), turn);
                    }
                    continue;
                }
            };

            match decision {
                Decision::ToolCall {
                    thought,
                    tool,
                    args,
                } => {
                    let observation = self.execute_tool(&tool, &args, ctx).await;
                    tracing::debug!(
                        agent = %self.name(),
                        iteration,
                        tool = %tool,
                        success = observation.is_success(),
                        "Turn completed"
                    );
                    let turn = trajectory.push(thought, tool, args, observation);
                    if let Some(observer) = &ctx.observer {
                        observer.on_turn(self.name(), turn);
                    }
                }
                Decision::Finish { thought, outputs } => {
                    let (outputs, warnings) = self.signature.coerce_outputs(outputs);
                    let result = RunResult {
                        outputs,
                        reasoning: Some(thought),
                        trajectory,
                        warnings,
                        reason: StopReason::Finished,
                        primary_field: self.signature.primary_output().name.clone(),
                    };
                    if let Some(observer) = &ctx.observer {
                        observer.on_finish(self.name(), &result, start.elapsed());
                    }
                    return Ok(result);
                }
            }
        }

        tracing::warn!(agent = %self.name(), max_iters = self.max_iters, "Iteration budget exhausted");
        Ok(self.finish_early(
            StopReason::BudgetExhausted,
            trajectory,
            vec![format!(
                "iteration budget of {} exhausted before a finish decision",
                self.max_iters
            )],
            ctx,
            start,
        ))
    }

    /// One model decision, bounded by the per-turn timeout if configured.
    /// `None` means the decision timed out.
    async fn decide(
        &self,
        request: DecisionRequest<'_>,
        ctx: &RunContext,
    ) -> Result<Option<Decision>, EngineError> {
        match ctx.decision_timeout {
            Some(limit) => match tokio::time::timeout(limit, ctx.model.decide(request)).await {
                Ok(decision) => Ok(Some(decision?)),
                Err(_) => Ok(None),
            },
            None => Ok(Some(ctx.model.decide(request).await?)),
        }
    }

    /// Execute one tool call, mapping every failure mode to an observation.
    async fn execute_tool(&self, tool: &str, args: &Value, ctx: &RunContext) -> Observation {
        let invocation = self.tools.invoke(tool, args, ctx);
        let outcome = match ctx.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => return Observation::Timeout,
            },
            None => invocation.await,
        };

        match outcome {
            Ok(value) => Observation::Success(stringify_output(&value)),
            Err(error @ ToolError::UnknownTool { .. }) => {
                tracing::debug!(agent = %self.name(), tool, "Unknown tool requested");
                Observation::Error(error.to_string())
            }
            Err(error) => Observation::Error(error.to_string()),
        }
    }

    /// Assemble a best-effort result for a run that did not finish.
    ///
    /// The primary output is the last successful observation when the field
    /// is textual, otherwise the type default; every other output takes its
    /// default.
    fn finish_early(
        &self,
        reason: StopReason,
        trajectory: Trajectory,
        mut warnings: Vec<String>,
        ctx: &RunContext,
        start: Instant,
    ) -> RunResult {
        let primary = self.signature.primary_output();
        let mut outputs = Record::new();
        for field in &self.signature.outputs {
            outputs.insert(field.name.clone(), field.ty.default_value());
        }

        match trajectory.last_success() {
            Some(text) if primary.ty == crate::signature::FieldType::String => {
                outputs.insert(primary.name.clone(), Value::String(text.to_string()));
            }
            Some(_) | None => {
                warnings.push(format!(
                    "no usable result for output field '{}'; using default",
                    primary.name
                ));
            }
        }

        let result = RunResult {
            outputs,
            reasoning: None,
            trajectory,
            warnings,
            reason,
            primary_field: primary.name.clone(),
        };
        if let Some(observer) = &ctx.observer {
            observer.on_finish(self.name(), &result, start.elapsed());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::signature::{FieldType, Signature};
    use crate::tools::{math::AddNumbers, ParamSpec, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    fn math_signature() -> Signature {
        Signature::new("math_calculator", "Answer math questions using the available tools.")
            .input("math_query", FieldType::String, "The question")
            .output("math_result", FieldType::String, "The answer")
    }

    fn math_agent(max_iters: usize) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(AddNumbers)).unwrap();
        Agent::new(math_signature(), tools, max_iters).unwrap()
    }

    fn math_input() -> Record {
        let mut input = Record::new();
        input.insert("math_query".into(), json!("What is 5 plus 3?"));
        input
    }

    fn finish_outputs(value: &str) -> Record {
        let mut outputs = Record::new();
        outputs.insert("math_result".into(), json!(value));
        outputs
    }

    /// Tool that sleeps well past any per-tool deadline used in tests.
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow_tool"
        }
        fn description(&self) -> &str {
            "Takes its time."
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            Vec::new()
        }
        fn return_type(&self) -> FieldType {
            FieldType::String
        }
        async fn execute(&self, _args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!("late"))
        }
    }

    /// Tool that always fails, for resilience tests.
    struct AlwaysFails;

    #[async_trait]
    impl Tool for AlwaysFails {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn description(&self) -> &str {
            "Fails unconditionally."
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            Vec::new()
        }
        fn return_type(&self) -> FieldType {
            FieldType::String
        }
        async fn execute(&self, _args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
            anyhow::bail!("intentional failure")
        }
    }

    #[tokio::test]
    async fn test_tool_call_then_finish() {
        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("add them", "add_numbers", json!({"a": 5, "b": 3})),
            Decision::finish("the sum is 8", finish_outputs("8")),
        ]));
        let ctx = RunContext::new(model);

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        assert_eq!(result.primary_text(), "8");
        assert_eq!(result.reasoning.as_deref(), Some("the sum is 8"));
        assert_eq!(result.trajectory.len(), 1);
        assert!(result.trajectory.turns()[0].observation.is_success());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("try something", "no_such_tool", json!({})),
            Decision::finish("recovered", finish_outputs("8")),
        ]));
        let ctx = RunContext::new(model);

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        let first = &result.trajectory.turns()[0];
        assert!(!first.observation.is_success());
        assert!(first.observation.as_text().contains("no_such_tool"));
    }

    #[tokio::test]
    async fn test_invalid_args_become_observation() {
        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("bad args", "add_numbers", json!({"a": "five"})),
            Decision::finish("recovered", finish_outputs("8")),
        ]));
        let ctx = RunContext::new(model);

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        assert!(!result.trajectory.turns()[0].observation.is_success());
    }

    #[tokio::test]
    async fn test_tool_failure_continues_loop() {
        let signature = math_signature();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(AlwaysFails)).unwrap();
        let agent = Agent::new(signature, tools, 3).unwrap();

        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("first try", "always_fails", json!({})),
            Decision::call("second try", "always_fails", json!({})),
            Decision::finish("giving a direct answer", finish_outputs("unknown")),
        ]));
        let ctx = RunContext::new(model);

        let result = agent.run(math_input(), &ctx).await.unwrap();
        assert_eq!(result.reason, StopReason::Finished);
        assert_eq!(result.trajectory.len(), 2);
        assert!(result
            .trajectory
            .turns()
            .iter()
            .all(|t| !t.observation.is_success()));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_runs_exactly_max_iters() {
        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("1", "add_numbers", json!({"a": 1, "b": 1})),
            Decision::call("2", "add_numbers", json!({"a": 2, "b": 2})),
            Decision::call("3", "add_numbers", json!({"a": 3, "b": 3})),
            // Never reached: the budget ends the run first.
            Decision::finish("too late", finish_outputs("nope")),
        ]));
        let ctx = RunContext::new(model.clone());

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::BudgetExhausted);
        assert_eq!(result.trajectory.len(), 3);
        assert_eq!(model.remaining(), 1);
        // Best-effort output from the last successful observation.
        assert_eq!(result.primary_text(), "6.0");
        assert!(!result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_without_success_uses_default() {
        let signature = math_signature();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(AlwaysFails)).unwrap();
        let agent = Agent::new(signature, tools, 2).unwrap();

        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("1", "always_fails", json!({})),
            Decision::call("2", "always_fails", json!({})),
        ]));
        let ctx = RunContext::new(model);

        let result = agent.run(math_input(), &ctx).await.unwrap();
        assert_eq!(result.reason, StopReason::BudgetExhausted);
        assert_eq!(result.primary_text(), "");
        assert!(result.warnings.len() >= 2);
    }

    #[tokio::test]
    async fn test_malformed_finish_is_coerced_with_warning() {
        let model = Arc::new(ScriptedModel::new(vec![Decision::finish(
            "done",
            Record::new(),
        )]));
        let ctx = RunContext::new(model);

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        assert_eq!(result.primary_output(), &json!(""));
        assert!(!result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let ctx = RunContext::new(model);

        let error = math_agent(3).run(Record::new(), &ctx).await.unwrap_err();
        assert!(matches!(error, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        // An exhausted script is a capability failure.
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let ctx = RunContext::new(model);

        let error = math_agent(3).run(math_input(), &ctx).await.unwrap_err();
        assert!(matches!(error, EngineError::Model(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_decision() {
        let token = CancellationToken::new();
        token.cancel();
        let model = Arc::new(ScriptedModel::new(vec![Decision::finish(
            "never reached",
            finish_outputs("8"),
        )]));
        let ctx = RunContext::new(model.clone()).with_cancel_token(token);

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Cancelled);
        assert!(result.trajectory.is_empty());
        assert_eq!(model.remaining(), 1);
    }

    #[tokio::test]
    async fn test_decision_timeout_consumes_iteration() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        model.push_delayed(
            Duration::from_millis(200),
            Decision::finish("slow", finish_outputs("8")),
        );
        model.push(Decision::finish("fast", finish_outputs("8")));

        let ctx = RunContext::new(model)
            .with_decision_timeout(Duration::from_millis(20));

        let result = math_agent(3).run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        // One turn lost to the timeout, then the fast decision finished.
        assert_eq!(result.trajectory.len(), 1);
        assert_eq!(result.trajectory.turns()[0].observation, Observation::Timeout);
    }

    #[tokio::test]
    async fn test_tool_timeout_becomes_timeout_observation() {
        let signature = math_signature();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(SlowTool)).unwrap();
        let agent = Agent::new(signature, tools, 3).unwrap();

        let model = Arc::new(ScriptedModel::new(vec![
            Decision::call("try the slow one", "slow_tool", json!({})),
            Decision::finish("answering without it", finish_outputs("8")),
        ]));
        let ctx = RunContext::new(model).with_tool_timeout(Duration::from_millis(20));

        let result = agent.run(math_input(), &ctx).await.unwrap();

        assert_eq!(result.reason, StopReason::Finished);
        assert_eq!(result.primary_text(), "8");
        // The timed-out call consumed an iteration but kept its decision.
        assert_eq!(result.trajectory.len(), 1);
        let turn = &result.trajectory.turns()[0];
        assert_eq!(turn.tool_name, "slow_tool");
        assert_eq!(turn.observation, Observation::Timeout);
    }

    #[tokio::test]
    async fn test_rerun_is_independent() {
        let agent = math_agent(3);

        for _ in 0..2 {
            let model = Arc::new(ScriptedModel::new(vec![
                Decision::call("add", "add_numbers", json!({"a": 5, "b": 3})),
                Decision::finish("done", finish_outputs("8")),
            ]));
            let ctx = RunContext::new(model);
            let result = agent.run(math_input(), &ctx).await.unwrap();
            assert_eq!(result.trajectory.len(), 1);
            assert_eq!(result.primary_text(), "8");
        }
    }
}
