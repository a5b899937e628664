//! Echo tool, used by chain fixtures and connectivity checks.

use serde_json::{Map, Value};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::plugins::ProceduralTool;

pub struct EchoTool;

impl ProceduralTool for EchoTool {
    fn key(&self) -> &'static str {
        "echo"
    }

    /// Returns the `x` argument when present, otherwise the full argument
    /// map, so chains can thread arbitrary values through it.
    fn run(&self, _ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        Ok(match args.get("x") {
            Some(value) => value.clone(),
            None => Value::Object(args.clone()),
        })
    }
}
