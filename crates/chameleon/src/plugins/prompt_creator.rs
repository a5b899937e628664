//! Meta-tool that registers or updates prompts at runtime.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::model::PromptRecord;
use crate::plugins::{ProceduralTool, required_str};
use crate::registry;
use crate::template;

pub struct PromptCreatorTool;

impl ProceduralTool for PromptCreatorTool {
    fn key(&self) -> &'static str {
        "create_new_prompt"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let name = required_str(args, "name")?;
        let description = required_str(args, "description")?;
        let tmpl = required_str(args, "template")?;
        let args_list = args
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let persona = args
            .get("persona")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.persona);

        // Reject broken templates at ingestion rather than at first use.
        template::check_syntax(tmpl)?;

        ctx.log(&format!("creating prompt: {name}"));
        registry::upsert_prompt(
            ctx.meta(),
            &PromptRecord {
                name: name.to_string(),
                description: description.to_string(),
                template: tmpl.to_string(),
                arguments_schema: json!({ "arguments": args_list.clone() }),
                persona: persona.to_string(),
                group: "auto".to_string(),
            },
        )?;

        let arg_names: Vec<&str> = args_list
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({
            "name": name,
            "persona": persona,
            "message": format!(
                "Prompt '{name}' has been registered for persona '{persona}'. It accepts arguments: {arg_names:?}"
            ),
        }))
    }
}
