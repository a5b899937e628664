//! MiniJinja-based template expansion.
//!
//! SQL templates use `{% %}` logic and `{{ }}` interpolation for
//! *structure only* (optional WHERE clauses, macro calls); values must
//! reach SQL as `:name` placeholders bound by the executor.  The argument
//! map is exposed to templates under the name `arguments`.
//!
//! Prompt templates render their arguments as top-level variables.

use minijinja::{Environment, context};
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// Render a SQL template with the active-macro preamble prepended.
///
/// Strings without any template syntax pass through without a parse.
pub fn expand_sql(preamble: &str, template: &str, args: &Map<String, Value>) -> EngineResult<String> {
    let combined = if preamble.is_empty() {
        template.to_string()
    } else {
        format!("{preamble}\n{template}")
    };

    if !combined.contains("{{") && !combined.contains("{%") {
        return Ok(combined);
    }

    let env = Environment::new();
    let tmpl = env.template_from_str(&combined)?;
    Ok(tmpl.render(context! { arguments => args })?)
}

/// Render a prompt template against its argument map.
pub fn render_prompt(template: &str, args: &Map<String, Value>) -> EngineResult<String> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.to_string());
    }
    let env = Environment::new();
    let tmpl = env.template_from_str(template)?;
    let ctx = minijinja::Value::from_serialize(args);
    Ok(tmpl.render(ctx)?)
}

/// Parse-check a template string without rendering it, so malformed
/// templates are rejected at ingestion instead of at first use.
pub fn check_syntax(template: &str) -> EngineResult<()> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(());
    }
    let env = Environment::new();
    env.template_from_str(template)?;
    Ok(())
}

/// Check that the required arguments named by a prompt's schema are all
/// present before rendering.
pub fn check_required_arguments(schema: &Value, args: &Map<String, Value>) -> EngineResult<()> {
    let Some(declared) = schema.get("arguments").and_then(Value::as_array) else {
        return Ok(());
    };
    for arg in declared {
        let required = arg.get("required").and_then(Value::as_bool).unwrap_or(false);
        let name = arg.get("name").and_then(Value::as_str).unwrap_or_default();
        if required && !args.contains_key(name) {
            return Err(EngineError::InvalidArguments(format!(
                "missing required argument '{name}'"
            )));
        }
    }
    Ok(())
}
