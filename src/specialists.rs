//! The standard specialist lineup and the coordinator over it.
//!
//! Four single-domain agents, each with its own signature and tools, plus a
//! builder that wires them all under one coordinator.

use std::sync::Arc;

use crate::agent::{Agent, Coordinator, EngineError};
use crate::signature::{FieldType, Signature};
use crate::tools::{
    math::{AddNumbers, MultiplyNumbers},
    text::{CountWords, ReverseText},
    time::{GetChinaTime, GetUsaTime},
    weather::{CompareCityTemperatures, GetWeatherByCity},
    Tool, ToolRegistry,
};

fn build_agent(
    signature: Signature,
    tools: Vec<Arc<dyn Tool>>,
    max_iters: usize,
) -> Result<Arc<Agent>, EngineError> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry
            .register(tool)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
    }
    Ok(Arc::new(Agent::new(signature, registry, max_iters)?))
}

/// Math specialist: arithmetic via calculator tools.
pub fn math_agent(max_iters: usize) -> Result<Arc<Agent>, EngineError> {
    let signature = Signature::new(
        "math_calculator",
        "Solve mathematical problems using the available calculation tools.",
    )
    .input("math_query", FieldType::String, "Mathematical question to solve")
    .output("math_result", FieldType::String, "Result of the calculation");
    build_agent(
        signature,
        vec![Arc::new(AddNumbers), Arc::new(MultiplyNumbers)],
        max_iters,
    )
}

/// Text specialist: word counting and reversal.
pub fn text_agent(max_iters: usize) -> Result<Arc<Agent>, EngineError> {
    let signature = Signature::new(
        "text_processor",
        "Process text using the available text manipulation tools.",
    )
    .input("text_query", FieldType::String, "Text processing request")
    .output("text_result", FieldType::String, "Result of the text processing");
    build_agent(
        signature,
        vec![Arc::new(CountWords), Arc::new(ReverseText)],
        max_iters,
    )
}

/// Time specialist: current time in supported timezones.
pub fn time_agent(max_iters: usize) -> Result<Arc<Agent>, EngineError> {
    let signature = Signature::new(
        "time_checker",
        "Answer questions about the current time in different regions.",
    )
    .input("time_query", FieldType::String, "Question about current time")
    .output("time_result", FieldType::String, "Current time information");
    build_agent(
        signature,
        vec![Arc::new(GetUsaTime), Arc::new(GetChinaTime)],
        max_iters,
    )
}

/// Weather specialist: current conditions and city comparisons.
pub fn weather_agent(max_iters: usize) -> Result<Arc<Agent>, EngineError> {
    let signature = Signature::new(
        "weather_checker",
        "Answer questions about current weather conditions in cities.",
    )
    .input("weather_query", FieldType::String, "Question about the weather")
    .output("weather_result", FieldType::String, "Current weather information");
    build_agent(
        signature,
        vec![Arc::new(GetWeatherByCity), Arc::new(CompareCityTemperatures)],
        max_iters,
    )
}

/// The full standard lineup under one coordinator.
pub fn standard_coordinator(
    specialist_max_iters: usize,
    coordinator_max_iters: usize,
) -> Result<Coordinator, EngineError> {
    Coordinator::new(
        vec![
            math_agent(specialist_max_iters)?,
            text_agent(specialist_max_iters)?,
            time_agent(specialist_max_iters)?,
            weather_agent(specialist_max_iters)?,
        ],
        coordinator_max_iters,
    )
}
