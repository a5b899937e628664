//! Workflow chain engine.
//!
//! A chain is an ordered list of steps `{id, tool, args}` where later
//! steps may reference earlier results with `${id}` or `${id.path}`.
//! Validation runs before any step executes; execution stops at the first
//! failing step and reports the partial outcome.  Nothing is rolled back:
//! successful steps keep their side effects.

use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{EngineError, EngineResult};

/// `${id}` or `${id.path}` — capture just the id for DAG validation.
static REF_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^.}]+)(?:\.[^}]*)?\}").unwrap());
/// Full `${...}` body for substitution.
static REF_FULL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Result strings inside reports are cut at this many characters.
const REPORT_RESULT_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ChainStep {
    pub id: String,
    pub tool: String,
    pub args: Value,
}

/// Parse and shape-check the `steps` argument.
pub fn parse_steps(arguments: &Map<String, Value>) -> EngineResult<Vec<ChainStep>> {
    let steps = arguments
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::InvalidArguments("'steps' must be a list".to_string()))?;
    if steps.is_empty() {
        return Err(EngineError::InvalidArguments(
            "no steps provided in chain".to_string(),
        ));
    }

    let mut parsed = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let object = step.as_object().ok_or_else(|| {
            EngineError::InvalidArguments(format!("step {i} is not an object"))
        })?;
        let field = |name: &str| -> EngineResult<String> {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    EngineError::InvalidArguments(format!(
                        "step {i} missing required field '{name}'"
                    ))
                })
        };
        parsed.push(ChainStep {
            id: field("id")?,
            tool: field("tool")?,
            args: object.get("args").cloned().ok_or_else(|| {
                EngineError::InvalidArguments(format!("step {i} missing required field 'args'"))
            })?,
        });
    }
    Ok(parsed)
}

/// Recursively collect every step id referenced by `${...}` expressions.
pub fn extract_refs(value: &Value) -> HashSet<String> {
    let mut refs = HashSet::new();
    collect_refs(value, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut HashSet<String>) {
    match value {
        Value::String(s) => {
            for capture in REF_ID.captures_iter(s) {
                refs.insert(capture[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, refs)),
        Value::Object(map) => map.values().for_each(|v| collect_refs(v, refs)),
        _ => {}
    }
}

/// Enforce the DAG rules: unique ids, and references only to earlier steps.
/// Fails the entire chain before any step runs.
pub fn validate_dag(steps: &[ChainStep]) -> EngineResult<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        if seen.contains(step.id.as_str()) {
            return Err(EngineError::DagViolation {
                step: step.id.clone(),
                detail: format!("duplicate step id at position {}", i + 1),
            });
        }

        let refs = extract_refs(&step.args);
        let mut invalid: Vec<&String> = refs.iter().filter(|r| !seen.contains(r.as_str())).collect();
        invalid.sort();
        if !invalid.is_empty() {
            let names: Vec<String> = invalid.iter().map(|r| format!("'{r}'")).collect();
            return Err(EngineError::DagViolation {
                step: step.id.clone(),
                detail: format!(
                    "step {} references future/unknown step(s): {}; only earlier steps can be referenced",
                    i + 1,
                    names.join(", ")
                ),
            });
        }

        seen.insert(step.id.as_str());
    }
    Ok(())
}

/// Substitute `${id}` / `${id.path}` references against the state map.
/// Values are stringified eagerly; unresolvable references become inline
/// `<ERROR: …>` markers rather than failing the step.
pub fn resolve_args(value: &Value, state: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_string(s, state)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_args(v, state)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_args(v, state)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, state: &Map<String, Value>) -> String {
    REF_FULL
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let reference = &caps[1];
            let (id, path) = match reference.split_once('.') {
                Some((id, path)) => (id, Some(path)),
                None => (reference, None),
            };

            let Some(result) = state.get(id) else {
                return format!("<ERROR: step '{id}' not found>");
            };
            match path {
                None => stringify(result),
                Some(path) => navigate(result, path),
            }
        })
        .into_owned()
}

/// Navigate one path segment: map key first, then numeric index.
fn navigate(value: &Value, path: &str) -> String {
    if let Some(object) = value.as_object() {
        return match object.get(path) {
            Some(v) => stringify(v),
            None => format!("<ERROR: key '{path}' not found>"),
        };
    }
    if let (Some(items), Ok(index)) = (value.as_array(), path.parse::<usize>()) {
        return match items.get(index) {
            Some(v) => stringify(v),
            None => format!("<ERROR: index {index} out of range>"),
        };
    }
    format!("<ERROR: cannot access '{path}'>")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= REPORT_RESULT_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(REPORT_RESULT_LIMIT).collect();
    format!("{cut}...")
}

/// Execute a validated chain through the given executor, producing the
/// structured success or partial-failure report.
pub fn run_chain<F>(steps: &[ChainStep], mut execute: F) -> EngineResult<Value>
where
    F: FnMut(&str, &Map<String, Value>) -> EngineResult<Value>,
{
    validate_dag(steps)?;

    let mut state: Map<String, Value> = Map::new();
    let mut executed: Vec<Value> = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        let resolved = resolve_args(&step.args, &state);
        let args = match resolved {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        match execute(&step.tool, &args) {
            Ok(result) => {
                executed.push(json!({
                    "step": i + 1,
                    "id": step.id,
                    "tool": step.tool,
                    "status": "SUCCESS",
                    "result": truncate(&stringify(&result)),
                }));
                state.insert(step.id.clone(), result);
            }
            Err(error) => {
                // Partial failure is a report, not an error: earlier steps
                // keep their side effects and their results are returned.
                return Ok(json!({
                    "status": "FAILED",
                    "failed_step": {
                        "step": i + 1,
                        "id": step.id,
                        "tool": step.tool,
                    },
                    "error": error.to_string(),
                    "total_steps": steps.len(),
                    "executed_steps": executed,
                    "suggestion": format!(
                        "Fix the '{}' tool call or its arguments and try again; the first {} step(s) completed successfully.",
                        step.tool,
                        executed.len()
                    ),
                }));
            }
        }
    }

    Ok(json!({
        "status": "SUCCESS",
        "total_steps": steps.len(),
        "executed_steps": executed,
        "state": Value::Object(state),
    }))
}
