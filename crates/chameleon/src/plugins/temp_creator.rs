//! Meta-tools for in-memory temporary tools and resources.
//!
//! Temporary entries never touch either database and do not survive a
//! restart; SQL-typed temporary tools carry an enforced `LIMIT 3`.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::hash::ContentHash;
use crate::model::CodeType;
use crate::plugins::{ProceduralTool, required_str};
use crate::template;
use crate::temp::{TempResource, TempTool};
use crate::validator;

pub struct TempToolCreatorTool;

impl ProceduralTool for TempToolCreatorTool {
    fn key(&self) -> &'static str {
        "system_create_temp_tool"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let tool_name = required_str(args, "tool_name")?;
        let description = required_str(args, "description")?;
        let sql_template = required_str(args, "sql_template")?;
        let input_schema = args
            .get("input_schema")
            .cloned()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

        // Validate up front with an empty argument map; optional-filter
        // branches render away and the bare statement must already pass.
        let preamble = ctx.engine.macro_preamble()?;
        let rendered = template::expand_sql(&preamble, sql_template, &Map::new())?;
        validator::validate_sql(&rendered)?;

        let code_hash = ContentHash::of(sql_template);
        ctx.engine.temp().insert_tool(
            TempTool {
                tool_name: tool_name.to_string(),
                persona: ctx.persona.clone(),
                description: description.to_string(),
                input_schema,
                code_hash,
            },
            sql_template,
            CodeType::SqlSelect,
        );

        Ok(json!({
            "tool_name": tool_name,
            "persona": ctx.persona,
            "message": format!(
                "Temporary tool '{tool_name}' registered for this process; results are capped at 3 rows."
            ),
        }))
    }
}

pub struct TempResourceCreatorTool;

impl ProceduralTool for TempResourceCreatorTool {
    fn key(&self) -> &'static str {
        "system_create_temp_resource"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let uri = required_str(args, "uri")?;
        let name = required_str(args, "name")?;
        let content = required_str(args, "content")?;
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mime_type = args
            .get("mime_type")
            .and_then(Value::as_str)
            .unwrap_or("text/plain");

        ctx.engine.temp().insert_resource(TempResource {
            uri: uri.to_string(),
            persona: ctx.persona.clone(),
            name: name.to_string(),
            description: description.to_string(),
            mime_type: mime_type.to_string(),
            content: content.to_string(),
        });

        Ok(json!({
            "uri": uri,
            "persona": ctx.persona,
            "message": format!("Temporary resource '{uri}' registered for this process."),
        }))
    }
}
