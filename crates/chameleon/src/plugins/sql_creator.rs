//! Meta-tool that registers new SQL tools at runtime.
//!
//! Created tools are flagged auto-created: clients see an `[AUTO-BUILD]`
//! marker and the engine caps their result sets at 1000 rows.

use serde_json::{Map, Value, json};

use crate::engine::{ToolContext, ToolSpec};
use crate::error::EngineResult;
use crate::model::CodeType;
use crate::plugins::{ProceduralTool, required_str};

pub struct SqlCreatorTool;

impl ProceduralTool for SqlCreatorTool {
    fn key(&self) -> &'static str {
        "system_create_sql_tool"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let tool_name = required_str(args, "tool_name")?;
        let description = required_str(args, "description")?;
        let sql_template = required_str(args, "sql_template")?;
        let input_schema = args
            .get("input_schema")
            .cloned()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
        let group = args
            .get("group")
            .and_then(Value::as_str)
            .unwrap_or("auto");

        let spec = ToolSpec {
            tool_name: tool_name.to_string(),
            persona: ctx.persona.clone(),
            description: description.to_string(),
            input_schema,
            is_auto_created: true,
            group: group.to_string(),
            icon_name: None,
            manual: None,
        };
        let hash = ctx
            .engine
            .install_tool(&spec, sql_template, CodeType::SqlSelect)?;

        Ok(json!({
            "tool_name": tool_name,
            "persona": ctx.persona,
            "hash": hash,
            "message": format!(
                "Tool '{tool_name}' registered; it will appear with an [AUTO-BUILD] marker and a 1000-row cap."
            ),
        }))
    }
}
