//! # taskweave
//!
//! Multi-agent task router built on a reason-act loop engine.
//!
//! An agent pairs a typed signature (named input and output fields) with a
//! tool registry and an iteration budget. Each turn, an external decision
//! model either calls a tool or finishes with output values; observations
//! feed back into the next decision. Agents compose: any agent can be
//! wrapped as a tool inside another agent's registry, which is how the
//! coordinator dispatches to its specialists.
//!
//! ## Architecture
//!
//! ```text
//!              ┌─────────────────────────┐
//!              │       Coordinator       │
//!              │ (tools = specialists)   │
//!              └───────────┬─────────────┘
//!          ┌───────────┬───┴───────┬───────────┐
//!          ▼           ▼           ▼           ▼
//!       math        text        time        weather
//!    calculator   processor    checker      checker
//!          │           │           │           │
//!          ▼           ▼           ▼           ▼
//!     add/multiply count/reverse timezones  Open-Meteo
//! ```
//!
//! Every agent, coordinator included, runs the same loop in
//! [`agent::Agent::run`]; the decision capability is injected per run
//! through [`agent::RunContext`].
//!
//! ## Modules
//! - `agent`: the loop engine, nested-agent adapter, and coordinator
//! - `signature`: typed field declarations and record validation
//! - `trajectory`: append-only turn history
//! - `tools`: tool trait, registry, and the built-in tool set
//! - `llm`: decision model trait and the OpenRouter backend
//! - `trace`: run observers
//! - `specialists`: the standard specialist lineup

pub mod agent;
pub mod config;
pub mod llm;
pub mod signature;
pub mod specialists;
pub mod tools;
pub mod trace;
pub mod trajectory;

pub use agent::{Agent, AgentTool, Coordinator, EngineError, RunContext, RunResult, StopReason};
pub use config::Config;
pub use llm::{Decision, DecisionModel, OpenRouterModel};
pub use signature::{FieldSpec, FieldType, Record, Signature};
pub use trace::{AgentObserver, ConsoleTracer};
pub use trajectory::{Observation, Trajectory, Turn};
