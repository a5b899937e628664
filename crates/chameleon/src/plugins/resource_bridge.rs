//! Resource bridge: exposes resource reads through the tool surface for
//! clients that implement Tools but not Resources.

use serde_json::{Map, Value};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::plugins::{ProceduralTool, required_str};

pub struct ReadResourceTool;

impl ProceduralTool for ReadResourceTool {
    fn key(&self) -> &'static str {
        "read_resource"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let uri = required_str(args, "uri")?;

        match ctx.engine.read_resource(uri, &ctx.persona) {
            Ok((content, _mime_type)) => Ok(Value::String(content)),
            Err(EngineError::ResourceNotFound { .. }) => {
                // List what does exist so the caller can self-correct.
                let available = ctx.engine.list_resources(&ctx.persona)?;
                if available.is_empty() {
                    return Ok(Value::String(format!(
                        "Resource not found: {uri}\n\nNo resources available for persona '{}'",
                        ctx.persona
                    )));
                }
                let uris: Vec<String> = available.into_iter().map(|r| r.uri).collect();
                Ok(Value::String(format!(
                    "Resource not found: {uri}\n\nAvailable resources are:\n  - {}",
                    uris.join("\n  - ")
                )))
            }
            Err(other) => Err(other),
        }
    }

    fn complete(&self, ctx: &ToolContext<'_>, argument: &str, prefix: &str) -> Vec<String> {
        if argument != "uri" {
            return Vec::new();
        }
        ctx.engine
            .list_resources(&ctx.persona)
            .map(|resources| {
                resources
                    .into_iter()
                    .map(|r| r.uri)
                    .filter(|uri| uri.starts_with(prefix))
                    .collect()
            })
            .unwrap_or_default()
    }
}
