//! Meta-tool that registers reusable SQL template macros.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::model::MacroRecord;
use crate::plugins::{ProceduralTool, required_str};

pub struct MacroCreatorTool;

impl ProceduralTool for MacroCreatorTool {
    fn key(&self) -> &'static str {
        "system_create_macro"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let name = required_str(args, "name")?;
        let description = required_str(args, "description")?;
        let template = required_str(args, "template")?;

        let trimmed = template.trim();
        if !trimmed.starts_with("{% macro") || !trimmed.ends_with("{% endmacro %}") {
            return Err(EngineError::InvalidArguments(
                "macro template must start with '{% macro' and end with '{% endmacro %}'"
                    .to_string(),
            ));
        }

        ctx.engine.install_macro(&MacroRecord {
            name: name.to_string(),
            description: description.to_string(),
            template: template.to_string(),
            is_active: true,
        })?;

        Ok(json!({
            "name": name,
            "message": format!(
                "Macro '{name}' registered; it is now prepended to every SQL template."
            ),
        }))
    }
}
