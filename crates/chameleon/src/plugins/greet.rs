//! Sample greeting tool, the canonical round-trip check for the engine.

use serde_json::{Map, Value};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::plugins::{ProceduralTool, required_str};

const SAMPLE_NAMES: &[&str] = &["Alice", "Bob", "Charlie", "Diana", "World"];

pub struct GreetTool;

impl ProceduralTool for GreetTool {
    fn key(&self) -> &'static str {
        "utility_greet"
    }

    fn run(&self, _ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let name = required_str(args, "name")?;
        Ok(Value::String(format!(
            "Hello {name}! I am running from the database."
        )))
    }

    fn complete(&self, _ctx: &ToolContext<'_>, argument: &str, prefix: &str) -> Vec<String> {
        if argument != "name" {
            return Vec::new();
        }
        SAMPLE_NAMES
            .iter()
            .filter(|n| n.to_lowercase().starts_with(&prefix.to_lowercase()))
            .map(|n| n.to_string())
            .collect()
    }
}
