//! Librarian tool over the agent notebook.

use serde_json::{Map, Value, json};

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};
use crate::notebook;
use crate::plugins::{ProceduralTool, required_str};

pub struct NotebookTool;

impl ProceduralTool for NotebookTool {
    fn key(&self) -> &'static str {
        "system_notebook"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let action = required_str(args, "action")?;
        let domain = required_str(args, "domain")?;
        let track = ctx.engine.notebook_tracking();
        let who = ctx.tool_name.as_str();

        match action {
            "write" => {
                let key = required_str(args, "key")?;
                let value = required_str(args, "value")?;
                notebook::write(ctx.meta(), domain, key, value, who, track)?;
                Ok(Value::String(format!("Stored {domain}/{key}.")))
            }
            "read" => {
                let key = required_str(args, "key")?;
                let entry = notebook::read(ctx.meta(), domain, key, who, track)?;
                Ok(match entry {
                    Some(entry) => json!({
                        "domain": entry.domain,
                        "key": entry.key,
                        "value": entry.value,
                        "updated_at": entry.updated_at,
                        "updated_by": entry.updated_by,
                    }),
                    None => Value::String(format!("No entry for {domain}/{key}.")),
                })
            }
            "delete" => {
                let key = required_str(args, "key")?;
                let removed = notebook::soft_delete(ctx.meta(), domain, key, who, track)?;
                Ok(Value::String(if removed {
                    format!("Deleted {domain}/{key} (history preserved).")
                } else {
                    format!("No entry for {domain}/{key}.")
                }))
            }
            "list" => {
                let entries = notebook::list_domain(ctx.meta(), domain)?;
                Ok(json!(
                    entries
                        .iter()
                        .map(|e| json!({"key": e.key, "value": e.value}))
                        .collect::<Vec<_>>()
                ))
            }
            "history" => {
                let key = required_str(args, "key")?;
                let changes = notebook::history(ctx.meta(), domain, key)?;
                Ok(json!(
                    changes
                        .iter()
                        .map(|c| json!({
                            "old_value": c.old_value,
                            "new_value": c.new_value,
                            "changed_at": c.changed_at,
                            "changed_by": c.changed_by,
                        }))
                        .collect::<Vec<_>>()
                ))
            }
            other => Err(EngineError::InvalidArguments(format!(
                "unknown action '{other}'; expected write, read, delete, list, or history"
            ))),
        }
    }

    fn complete(&self, _ctx: &ToolContext<'_>, argument: &str, prefix: &str) -> Vec<String> {
        if argument != "action" {
            return Vec::new();
        }
        ["write", "read", "delete", "list", "history"]
            .iter()
            .filter(|a| a.starts_with(prefix))
            .map(|a| a.to_string())
            .collect()
    }
}
