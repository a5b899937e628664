//! Small arithmetic and text sample tools.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::plugins::{ProceduralTool, required_str};

fn number(args: &Map<String, Value>, name: &str) -> EngineResult<f64> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| EngineError::InvalidArguments(format!("'{name}' must be a number")))
}

pub struct AddTool;

impl ProceduralTool for AddTool {
    fn key(&self) -> &'static str {
        "math_add"
    }

    fn run(&self, _ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let a = number(args, "a")?;
        let b = number(args, "b")?;
        Ok(json!(a + b))
    }
}

pub struct UppercaseTool;

impl ProceduralTool for UppercaseTool {
    fn key(&self) -> &'static str {
        "utility_uppercase"
    }

    fn run(&self, _ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        Ok(Value::String(required_str(args, "text")?.to_uppercase()))
    }
}
