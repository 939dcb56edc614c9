//! taskweave - CLI entry point.
//!
//! Builds the standard coordinator and routes one query from the command
//! line, printing a live transcript of every agent's turns.

use std::sync::Arc;

use taskweave::{
    config::Config, specialists::standard_coordinator, ConsoleTracer, OpenRouterModel, RunContext,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_QUERY: &str =
    "Can you tell me the weather in berlin and the current time in China?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskweave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    let query = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let query = if query.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        query
    };

    let model = Arc::new(OpenRouterModel::new(
        config.openrouter_api_key.clone(),
        config.default_model.clone(),
    ));
    let mut ctx = RunContext::new(model).with_observer(Arc::new(ConsoleTracer));
    if let Some(timeout) = config.decision_timeout {
        ctx = ctx.with_decision_timeout(timeout);
    }
    if let Some(timeout) = config.tool_timeout {
        ctx = ctx.with_tool_timeout(timeout);
    }

    let coordinator = standard_coordinator(config.specialist_max_iters, config.max_iters)?;
    let result = coordinator.handle(&query, &ctx).await?;

    println!("{}", result.primary_text());
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
