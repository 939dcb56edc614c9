//! OpenRouter-backed decision model with automatic retry for transient errors.
//!
//! Renders the decision context into a chat prompt, asks the model for a
//! strict-JSON decision, and parses the reply into `Decision`. Transient HTTP
//! failures are retried with backoff; parse failures are permanent.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{classify_http_status, ModelError, RetryConfig};
use super::{Decision, DecisionModel, DecisionRequest};
use crate::signature::Record;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter chat-completions client speaking the decision protocol.
pub struct OpenRouterModel {
    client: Client,
    api_key: String,
    model: String,
    retry_config: RetryConfig,
}

impl OpenRouterModel {
    /// Create a client with the default retry configuration.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            retry_config: RetryConfig::default(),
        }
    }

    /// Create a client with a custom retry configuration.
    pub fn with_retry_config(
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            retry_config,
        }
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let response = self
            .client
            .post(OPENROUTER_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    ModelError::Network(format!("Connection failed: {}", e))
                } else {
                    ModelError::Network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_http_status(status.as_u16(), body, retry_after));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ModelError::Parse(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::Parse("No content in response".to_string()))
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(content) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Decision request succeeded after {} retries ({:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(content);
                }
                Err(error) => {
                    let budget_left = start.elapsed() < self.retry_config.max_retry_duration;
                    if !(self.retry_config.should_retry(&error, attempt) && budget_left) {
                        tracing::error!("Decision request failed: {}", error);
                        return Err(error);
                    }
                    let delay = error.suggested_delay(attempt);
                    tracing::warn!(
                        "Decision request attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl DecisionModel for OpenRouterModel {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, ModelError> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: build_system_prompt(&request),
                },
                ChatMessage {
                    role: "user",
                    content: build_user_prompt(&request),
                },
            ],
            temperature: 0.0,
        };

        tracing::debug!(model = %self.model, "Requesting decision from OpenRouter");
        let content = self.execute_with_retry(&chat).await?;
        parse_decision(&content)
    }
}

/// Render the decision protocol and the tool surface.
fn build_system_prompt(request: &DecisionRequest<'_>) -> String {
    let mut tools_block = String::new();
    for descriptor in request.tools {
        tools_block.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            descriptor.name,
            descriptor.description,
            descriptor.parameters_schema()
        ));
    }

    let outputs_block = request
        .output_fields
        .iter()
        .map(|f| format!("- {} ({}): {}", f.name, f.ty, f.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{instruction}

You work in turns. Each turn you reply with exactly one JSON object and nothing else:

{{"thought": "<your reasoning>", "action": {{"type": "call", "tool": "<tool name>", "args": {{...}}}}}}

or, when you can answer:

{{"thought": "<your reasoning>", "action": {{"type": "finish", "outputs": {{...}}}}}}

## Available tools
{tools_block}
## Output fields the finish action must populate
{outputs_block}"#,
        instruction = request.instruction,
        tools_block = tools_block,
        outputs_block = outputs_block,
    )
}

/// Render the input record and the trajectory so far.
fn build_user_prompt(request: &DecisionRequest<'_>) -> String {
    let mut inputs_block = String::new();
    for field in request.input_fields {
        let value = request
            .inputs
            .get(&field.name)
            .cloned()
            .unwrap_or(Value::Null);
        inputs_block.push_str(&format!("{} = {}\n", field.name, value));
    }

    if request.trajectory.is_empty() {
        format!("## Input\n{}\nDecide your first action.", inputs_block)
    } else {
        format!(
            "## Input\n{}\n## Previous turns\n{}\nDecide your next action.",
            inputs_block, request.trajectory
        )
    }
}

/// Parse the model's reply into a decision.
///
/// Tolerates markdown code fences and prose around the JSON object; the
/// object itself must follow the protocol exactly.
pub fn parse_decision(content: &str) -> Result<Decision, ModelError> {
    let json_slice = extract_json_object(content)
        .ok_or_else(|| ModelError::Parse(format!("No JSON object in reply: {}", content)))?;

    let wire: DecisionWire = serde_json::from_str(json_slice)
        .map_err(|e| ModelError::Parse(format!("Malformed decision: {} in {}", e, json_slice)))?;

    Ok(match wire.action {
        ActionWire::Call { tool, args } => Decision::ToolCall {
            thought: wire.thought,
            tool,
            args,
        },
        ActionWire::Finish { outputs } => Decision::Finish {
            thought: wire.thought,
            outputs,
        },
    })
}

/// Slice out the outermost JSON object from a possibly fenced/prefixed reply.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Wire format of the decision protocol.
#[derive(Debug, Deserialize)]
struct DecisionWire {
    #[serde(default)]
    thought: String,
    action: ActionWire,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ActionWire {
    Call {
        tool: String,
        #[serde(default)]
        args: Value,
    },
    Finish {
        #[serde(default)]
        outputs: Record,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tool_call_decision() {
        let reply = r#"{"thought": "need the sum", "action": {"type": "call", "tool": "add_numbers", "args": {"a": 5, "b": 3}}}"#;
        let decision = parse_decision(reply).unwrap();
        assert_eq!(
            decision,
            Decision::call("need the sum", "add_numbers", json!({"a": 5, "b": 3}))
        );
    }

    #[test]
    fn test_parse_finish_decision() {
        let reply =
            r#"{"thought": "done", "action": {"type": "finish", "outputs": {"math_result": "8"}}}"#;
        match parse_decision(reply).unwrap() {
            Decision::Finish { thought, outputs } => {
                assert_eq!(thought, "done");
                assert_eq!(outputs["math_result"], json!("8"));
            }
            other => panic!("expected finish, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tolerates_code_fences() {
        let reply = "```json\n{\"thought\": \"t\", \"action\": {\"type\": \"finish\", \"outputs\": {}}}\n```";
        assert!(matches!(
            parse_decision(reply).unwrap(),
            Decision::Finish { .. }
        ));
    }

    #[test]
    fn test_parse_tolerates_surrounding_prose() {
        let reply = "Here is my decision: {\"thought\": \"t\", \"action\": {\"type\": \"call\", \"tool\": \"x\", \"args\": {}}} Hope that helps.";
        assert!(matches!(
            parse_decision(reply).unwrap(),
            Decision::ToolCall { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_decision("I cannot decide.").is_err());
        assert!(parse_decision("{\"thought\": \"no action\"}").is_err());
    }

    #[test]
    fn test_system_prompt_lists_tools_and_outputs() {
        use crate::signature::{FieldSpec, FieldType};
        use crate::tools::ToolDescriptor;

        let inputs = Record::new();
        let input_fields = vec![FieldSpec::new("math_query", FieldType::String, "question")];
        let output_fields = vec![FieldSpec::new("math_result", FieldType::String, "result")];
        let tools = vec![ToolDescriptor {
            name: "add_numbers".into(),
            description: "Add two numbers".into(),
            parameters: vec![],
            return_type: FieldType::Number,
        }];
        let request = DecisionRequest {
            instruction: "Answer math questions",
            inputs: &inputs,
            input_fields: &input_fields,
            output_fields: &output_fields,
            tools: &tools,
            trajectory: "",
        };

        let prompt = build_system_prompt(&request);
        assert!(prompt.contains("add_numbers"));
        assert!(prompt.contains("math_result"));
        assert!(prompt.contains("Answer math questions"));
    }
}
