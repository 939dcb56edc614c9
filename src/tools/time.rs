//! Timezone tools for the time specialist.

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;

use super::{ParamSpec, Tool};
use crate::agent::RunContext;
use crate::signature::FieldType;

/// Format the current time in the given zone as `YYYY-MM-DD HH:MM:SS TZ`.
fn current_time_in(tz: Tz) -> String {
    Utc::now()
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Current time in USA Eastern Time (America/New_York).
pub struct GetUsaTime;

#[async_trait]
impl Tool for GetUsaTime {
    fn name(&self) -> &str {
        "get_usa_time"
    }

    fn description(&self) -> &str {
        "Get the current time in USA (Eastern Time)."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn return_type(&self) -> FieldType {
        FieldType::String
    }

    async fn execute(&self, _args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        Ok(Value::String(current_time_in(chrono_tz::America::New_York)))
    }
}

/// Current time in China (Asia/Shanghai).
pub struct GetChinaTime;

#[async_trait]
impl Tool for GetChinaTime {
    fn name(&self) -> &str {
        "get_china_time"
    }

    fn description(&self) -> &str {
        "Get the current time in China (Beijing Time)."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn return_type(&self) -> FieldType {
        FieldType::String
    }

    async fn execute(&self, _args: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        Ok(Value::String(current_time_in(chrono_tz::Asia::Shanghai)))
    }
}
