//! Black-box recorder access: surfaces the last recorded failure so an
//! agent can inspect exactly why a tool broke.

use serde_json::{Map, Value, json};

use crate::audit;
use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::plugins::ProceduralTool;

pub struct LastErrorTool;

impl ProceduralTool for LastErrorTool {
    fn key(&self) -> &'static str {
        "debug_get_last_error"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let tool_name = args.get("tool_name").and_then(Value::as_str);
        let failure = audit::last_failure(ctx.meta(), tool_name)?;

        Ok(match failure {
            Some(record) => json!({
                "tool_name": record.tool_name,
                "persona": record.persona,
                "timestamp": record.timestamp,
                "arguments": record.arguments,
                "error_detail": record.error_detail,
            }),
            None => Value::String("No failures recorded.".to_string()),
        })
    }
}
