//! Tool inspection: surfaces a tool's manual, schema, and metadata so a
//! calling agent can check how to use it before invoking it.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::plugins::{ProceduralTool, required_str};
use crate::registry;

pub struct InspectTool;

impl ProceduralTool for InspectTool {
    fn key(&self) -> &'static str {
        "system_inspect_tool"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let tool_name = required_str(args, "tool_name")?;

        // The caller's persona first, then any persona carrying the name.
        let tool = match registry::get_tool(ctx.meta(), tool_name, &ctx.persona)? {
            Some(tool) => tool,
            None => registry::find_tool_any_persona(ctx.meta(), tool_name)?.ok_or_else(|| {
                EngineError::ToolNotFound {
                    name: tool_name.to_string(),
                    persona: ctx.persona.clone(),
                }
            })?,
        };

        Ok(json!({
            "tool_name": tool.tool_name,
            "description": tool.description,
            "persona": tool.persona,
            "group": tool.group,
            "input_schema": tool.input_schema,
            "is_auto_created": tool.is_auto_created,
            "manual": tool.manual.unwrap_or_else(|| json!({})),
        }))
    }
}
