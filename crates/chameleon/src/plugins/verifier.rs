//! Manual example verifier.
//!
//! Runs every example recorded in a tool's manual and flips each
//! `verified` flag in place to reflect the observed outcome.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::registry;
use crate::plugins::{ProceduralTool, required_str};

pub struct VerifyExamplesTool;

impl ProceduralTool for VerifyExamplesTool {
    fn key(&self) -> &'static str {
        "system_verify_examples"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let tool_name = required_str(args, "tool_name")?;

        let tool = registry::get_tool(ctx.meta(), tool_name, &ctx.persona)?.ok_or_else(|| {
            EngineError::ToolNotFound {
                name: tool_name.to_string(),
                persona: ctx.persona.clone(),
            }
        })?;
        let mut manual = tool.manual.ok_or_else(|| {
            EngineError::InvalidArguments(format!("tool '{tool_name}' has no manual"))
        })?;

        let Some(examples) = manual.get_mut("examples").and_then(Value::as_array_mut) else {
            return Ok(Value::String(format!(
                "Manual for '{tool_name}' has no examples to verify."
            )));
        };

        let mut verified = 0usize;
        let mut failed = 0usize;
        for example in examples.iter_mut() {
            let example_args = example
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            let outcome = ctx.execute(tool_name, &example_args);
            let ok = match (&outcome, example.get("expected")) {
                (Ok(result), Some(expected)) => stringified(result) == stringified(expected),
                (Ok(_), None) => true,
                (Err(_), _) => false,
            };

            if let Some(object) = example.as_object_mut() {
                object.insert("verified".to_string(), Value::Bool(ok));
            }
            if ok {
                verified += 1;
            } else {
                failed += 1;
            }
        }

        registry::update_tool_manual(ctx.meta(), tool_name, &ctx.persona, &manual)?;

        Ok(json!({
            "tool_name": tool_name,
            "verified": verified,
            "failed": failed,
        }))
    }
}

fn stringified(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
