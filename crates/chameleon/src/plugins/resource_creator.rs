//! Meta-tool that registers or updates static resources at runtime.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::model::ResourceRecord;
use crate::plugins::{ProceduralTool, required_str};
use crate::registry;

pub struct ResourceCreatorTool;

impl ProceduralTool for ResourceCreatorTool {
    fn key(&self) -> &'static str {
        "create_new_resource"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let uri = required_str(args, "uri")?;
        let name = required_str(args, "name")?;
        let description = required_str(args, "description")?;
        let content = required_str(args, "content")?;
        let mime_type = args
            .get("mime_type")
            .and_then(Value::as_str)
            .unwrap_or("text/plain");
        let persona = args
            .get("persona")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.persona);

        ctx.log(&format!("creating resource: {uri}"));
        registry::upsert_resource(
            ctx.meta(),
            &ResourceRecord {
                uri: uri.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                mime_type: mime_type.to_string(),
                is_dynamic: false,
                static_content: Some(content.to_string()),
                active_hash_ref: None,
                persona: persona.to_string(),
                group: "auto".to_string(),
            },
        )?;

        Ok(json!({
            "uri": uri,
            "persona": persona,
            "message": format!(
                "Resource '{uri}' has been registered for persona '{persona}' as a static resource with MIME type '{mime_type}'."
            ),
        }))
    }
}
