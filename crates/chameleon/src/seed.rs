//! Sample catalogue bootstrap.
//!
//! Idempotent: every entry is an upsert, and sample business data is only
//! inserted into an empty table.  `serve` runs this automatically when the
//! tool registry is empty; the `seed` subcommand runs it on demand.

use serde_json::{Value, json};

use crate::engine::{Engine, ToolSpec};
use crate::error::EngineResult;
use crate::model::{CodeType, IconRecord, MacroRecord, PolicyRecord, PromptRecord, ResourceRecord};
use crate::plugins::manifest_for;
use crate::registry;
use crate::store::DataStore;
use crate::vault;

const DEFAULT_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><circle cx="8" cy="8" r="7" fill="#3aa655"/><circle cx="11" cy="6" r="1.5" fill="#fff"/></svg>"##;

const SALES_SUMMARY_SQL: &str = "SELECT
    store_name,
    department,
    SUM(sales_amount) AS total_sales,
    COUNT(*) AS transaction_count
FROM sales_per_day
WHERE 1=1
{% if arguments.store_name %}
  AND store_name = :store_name
{% endif %}
{% if arguments.department %}
  AND department = :department
{% endif %}
GROUP BY store_name, department
ORDER BY total_sales DESC";

const SALES_BY_CATEGORY_SQL: &str = "SELECT
    department,
    SUM(sales_amount) AS total_sales,
    AVG(sales_amount) AS avg_sales
FROM sales_per_day
WHERE 1=1
{% if arguments.start_date %}
  AND business_date >= :start_date
{% endif %}
{% if arguments.end_date %}
  AND business_date <= :end_date
{% endif %}
{% if arguments.min_amount %}
  AND sales_amount >= :min_amount
{% endif %}
GROUP BY department
ORDER BY total_sales DESC";

const SALES_BY_STORE_SQL: &str =
    "SELECT * FROM sales_per_day WHERE store_name = :store_name ORDER BY business_date";

const RECENT_SALES_SQL: &str = "SELECT
    business_date,
    store_name,
    SUM(sales_amount) AS daily_total
FROM sales_per_day
GROUP BY business_date, store_name
ORDER BY business_date DESC
LIMIT 10";

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// True when the tool registry holds no rows (fresh metadata store).
pub fn is_catalogue_empty(engine: &Engine) -> EngineResult<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {t}",
        t = engine.meta().tables().tool_registry
    );
    let count: i64 = engine.meta().conn().query_row(&sql, [], |row| row.get(0))?;
    Ok(count == 0)
}

/// Upsert the full sample catalogue into the metadata store.
pub fn seed_catalogue(engine: &Engine) -> EngineResult<()> {
    seed_procedural_tools(engine)?;
    seed_sql_tools(engine)?;
    seed_resources(engine)?;
    seed_prompts(engine)?;
    seed_macros(engine)?;
    seed_icons(engine)?;
    seed_policies(engine)?;
    Ok(())
}

/// Populate the sample sales table: 15 rows across stores {A, B, C} and
/// departments {Electronics, Clothing, Groceries}.  No-op when the table
/// already has data.
pub fn seed_sample_data(data: &DataStore) -> EngineResult<()> {
    let table = data.tables().sales_per_day.clone();
    let conn = data.conn();

    let existing: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
    if existing > 0 {
        return Ok(());
    }

    let stores = ["Store A", "Store B", "Store C"];
    let departments = ["Electronics", "Clothing", "Groceries"];
    let base = time::Date::from_calendar_date(2024, time::Month::January, 1)
        .expect("valid fixed date");
    let day_format = time::macros::format_description!("[year]-[month]-[day]");

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (business_date, store_name, department, sales_amount)
         VALUES (?1, ?2, ?3, ?4)"
    ))?;
    for i in 0..15i64 {
        let date = base + time::Duration::days(i);
        let raw = 1000.0 + (i as f64) * 150.75 + ((i % 3) as f64) * 500.0;
        let amount = (raw * 100.0).round() / 100.0;
        stmt.execute(rusqlite::params![
            date.format(&day_format).unwrap_or_default(),
            stores[(i % 3) as usize],
            departments[(i % 3) as usize],
            amount,
        ])?;
    }
    Ok(())
}

/// Catalogue plus sample data when the data store is reachable.
pub fn seed_all(engine: &Engine) -> EngineResult<()> {
    seed_catalogue(engine)?;
    if let Some(data) = engine.data() {
        seed_sample_data(&data)?;
    } else {
        tracing::warn!("data database not available - skipping sample data seeding");
    }
    Ok(())
}

fn install_procedural(
    engine: &Engine,
    name: &str,
    description: &str,
    schema: Value,
    group: &str,
    manual: Option<Value>,
) -> EngineResult<()> {
    let spec = ToolSpec {
        tool_name: name.to_string(),
        persona: "default".to_string(),
        description: description.to_string(),
        input_schema: schema,
        is_auto_created: false,
        group: group.to_string(),
        icon_name: Some("default_chameleon".to_string()),
        manual,
    };
    engine.install_tool(&spec, &manifest_for(name), CodeType::Procedural)?;
    Ok(())
}

fn seed_procedural_tools(engine: &Engine) -> EngineResult<()> {
    install_procedural(
        engine,
        "utility_greet",
        "Greet a user by name, served straight from the code vault.",
        object_schema(
            json!({"name": {"type": "string", "description": "Name of the person to greet"}}),
            &["name"],
        ),
        "utility",
        Some(json!({
            "usage_guide": "Call with a 'name' string; returns a greeting sentence.",
            "examples": [
                {
                    "args": {"name": "Alice"},
                    "expected": "Hello Alice! I am running from the database.",
                    "verified": false
                }
            ],
            "pitfalls": ["The 'name' argument is required."],
            "error_codes": {"BAD_ARGUMENTS": "missing 'name'"}
        })),
    )?;

    install_procedural(
        engine,
        "math_add",
        "Add two numbers.",
        object_schema(
            json!({
                "a": {"type": "number", "description": "First operand"},
                "b": {"type": "number", "description": "Second operand"}
            }),
            &["a", "b"],
        ),
        "math",
        None,
    )?;

    install_procedural(
        engine,
        "utility_uppercase",
        "Convert text to uppercase.",
        object_schema(
            json!({"text": {"type": "string", "description": "Text to convert"}}),
            &["text"],
        ),
        "utility",
        None,
    )?;

    install_procedural(
        engine,
        "echo",
        "Echo the 'x' argument back; useful for chain experiments.",
        object_schema(json!({"x": {"type": "string", "description": "Value to echo"}}), &[]),
        "utility",
        None,
    )?;

    install_procedural(
        engine,
        "debug_get_last_error",
        "Fetch the most recent execution failure, optionally for one tool.",
        object_schema(
            json!({"tool_name": {"type": "string", "description": "Optional tool to inspect"}}),
            &[],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_run_chain",
        "Run a chain of tool calls with ${id} substitution and DAG validation.",
        object_schema(
            json!({
                "steps": {
                    "type": "array",
                    "description": "Steps of the form {id, tool, args}; args may reference earlier steps as ${id} or ${id.path}",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "tool": {"type": "string"},
                            "args": {"type": "object"}
                        },
                        "required": ["id", "tool", "args"]
                    }
                }
            }),
            &["steps"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "reconnect_db",
        "Re-attempt the business database connection with exponential backoff.",
        object_schema(json!({}), &[]),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_notebook",
        "Read and write the agent's long-term notebook (write, read, delete, list, history).",
        object_schema(
            json!({
                "action": {"type": "string", "enum": ["write", "read", "delete", "list", "history"]},
                "domain": {"type": "string", "description": "Namespace, e.g. user_prefs"},
                "key": {"type": "string"},
                "value": {"type": "string"}
            }),
            &["action", "domain"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_create_sql_tool",
        "Register a new SELECT-based tool at runtime (marked [AUTO-BUILD], capped at 1000 rows).",
        object_schema(
            json!({
                "tool_name": {"type": "string"},
                "description": {"type": "string"},
                "sql_template": {"type": "string", "description": "SELECT template; values must use :name placeholders"},
                "input_schema": {"type": "object"},
                "group": {"type": "string"}
            }),
            &["tool_name", "description", "sql_template"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_create_macro",
        "Register a reusable template macro shared by all SQL tools.",
        object_schema(
            json!({
                "name": {"type": "string", "description": "Macro name, e.g. safe_div"},
                "description": {"type": "string"},
                "template": {"type": "string", "description": "Must start with '{% macro' and end with '{% endmacro %}'"}
            }),
            &["name", "description", "template"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_create_temp_tool",
        "Register an in-memory SELECT tool for this process only (capped at 3 rows).",
        object_schema(
            json!({
                "tool_name": {"type": "string"},
                "description": {"type": "string"},
                "sql_template": {"type": "string"},
                "input_schema": {"type": "object"}
            }),
            &["tool_name", "description", "sql_template"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_create_temp_resource",
        "Register an in-memory static resource for this process only.",
        object_schema(
            json!({
                "uri": {"type": "string"},
                "name": {"type": "string"},
                "content": {"type": "string"},
                "description": {"type": "string"},
                "mime_type": {"type": "string"}
            }),
            &["uri", "name", "content"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_inspect_tool",
        "Inspect a tool's documentation (manual), schema, and metadata. Useful for verifying \
         how to use complex tools before calling them.",
        object_schema(
            json!({"tool_name": {"type": "string", "description": "The name of the tool to inspect"}}),
            &["tool_name"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "create_new_prompt",
        "Create or update a prompt in the prompt registry.",
        object_schema(
            json!({
                "name": {"type": "string", "description": "Prompt name, e.g. review_code"},
                "description": {"type": "string"},
                "template": {"type": "string", "description": "Template with {{ placeholder }} variables"},
                "arguments": {
                    "type": "array",
                    "description": "Argument definitions: [{name, description, required}]",
                    "items": {"type": "object"}
                },
                "persona": {"type": "string"}
            }),
            &["name", "description", "template"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "create_new_resource",
        "Create or update a static resource in the resource registry.",
        object_schema(
            json!({
                "uri": {"type": "string", "description": "Resource URI, e.g. memo://project_notes"},
                "name": {"type": "string"},
                "description": {"type": "string"},
                "content": {"type": "string", "description": "Static text content"},
                "mime_type": {"type": "string"},
                "persona": {"type": "string"}
            }),
            &["uri", "name", "description", "content"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "read_resource",
        "Read a resource by URI through the tool surface, for clients that support Tools but \
         not Resources.",
        object_schema(
            json!({"uri": {"type": "string", "description": "URI of the resource to read"}}),
            &["uri"],
        ),
        "system",
        None,
    )?;

    install_procedural(
        engine,
        "system_verify_examples",
        "Run every example in a tool's manual and update its verified flags.",
        object_schema(
            json!({"tool_name": {"type": "string", "description": "Tool whose manual to verify"}}),
            &["tool_name"],
        ),
        "system",
        None,
    )?;

    Ok(())
}

fn seed_sql_tools(engine: &Engine) -> EngineResult<()> {
    engine.install_tool(
        &ToolSpec {
            tool_name: "data_get_sales_summary".to_string(),
            persona: "default".to_string(),
            description: "Get sales summary grouped by store and department. Supports optional \
                          filtering by store_name and/or department using secure parameter binding."
                .to_string(),
            input_schema: object_schema(
                json!({
                    "store_name": {"type": "string", "description": "Optional: filter by store name"},
                    "department": {"type": "string", "description": "Optional: filter by department"}
                }),
                &[],
            ),
            is_auto_created: false,
            group: "data".to_string(),
            icon_name: Some("default_chameleon".to_string()),
            manual: None,
        },
        SALES_SUMMARY_SQL,
        CodeType::SqlSelect,
    )?;

    engine.install_tool(
        &ToolSpec {
            tool_name: "data_get_sales_by_category".to_string(),
            persona: "default".to_string(),
            description: "Get sales by department with optional date range and minimum amount \
                          filters."
                .to_string(),
            input_schema: object_schema(
                json!({
                    "start_date": {"type": "string", "description": "Optional: start date (YYYY-MM-DD)"},
                    "end_date": {"type": "string", "description": "Optional: end date (YYYY-MM-DD)"},
                    "min_amount": {"type": "number", "description": "Optional: minimum sales amount"}
                }),
                &[],
            ),
            is_auto_created: false,
            group: "data".to_string(),
            icon_name: Some("default_chameleon".to_string()),
            manual: None,
        },
        SALES_BY_CATEGORY_SQL,
        CodeType::SqlSelect,
    )?;

    engine.install_tool(
        &ToolSpec {
            tool_name: "get_sales_by_store".to_string(),
            persona: "default".to_string(),
            description: "Get raw sales records for one store.".to_string(),
            input_schema: object_schema(
                json!({
                    "store_name": {"type": "string", "description": "Name of the store to filter by"}
                }),
                &["store_name"],
            ),
            is_auto_created: false,
            group: "data".to_string(),
            icon_name: Some("default_chameleon".to_string()),
            manual: None,
        },
        SALES_BY_STORE_SQL,
        CodeType::SqlSelect,
    )?;

    Ok(())
}

fn seed_resources(engine: &Engine) -> EngineResult<()> {
    registry::upsert_resource(
        engine.meta(),
        &ResourceRecord {
            uri: "docs://chameleon/welcome".to_string(),
            name: "chameleon_welcome".to_string(),
            description: "Orientation notes for the tool catalogue.".to_string(),
            mime_type: "text/plain".to_string(),
            is_dynamic: false,
            static_content: Some(
                "Welcome to the Chameleon Engine. Tools, resources, and prompts listed here are \
                 served from the metadata database; use system_create_sql_tool to add new SELECT \
                 tools and reconnect_db if business data is offline."
                    .to_string(),
            ),
            active_hash_ref: None,
            persona: "default".to_string(),
            group: "system".to_string(),
        },
    )?;

    let recent_sales_hash = vault::upsert(engine.meta(), RECENT_SALES_SQL, CodeType::SqlSelect)?;
    registry::upsert_resource(
        engine.meta(),
        &ResourceRecord {
            uri: "data://sales/recent".to_string(),
            name: "data_sales_report".to_string(),
            description: "Recent sales report showing daily totals by store (last 10 days)."
                .to_string(),
            mime_type: "application/json".to_string(),
            is_dynamic: true,
            static_content: None,
            active_hash_ref: Some(recent_sales_hash),
            persona: "default".to_string(),
            group: "data".to_string(),
        },
    )?;

    Ok(())
}

fn seed_prompts(engine: &Engine) -> EngineResult<()> {
    registry::upsert_prompt(
        engine.meta(),
        &PromptRecord {
            name: "review_code".to_string(),
            description: "Ask for a structured review of a code snippet.".to_string(),
            template: "Review the following {{ language }} code. Point out bugs, style issues, \
                       and missing error handling:\n\n{{ code }}"
                .to_string(),
            arguments_schema: json!({
                "arguments": [
                    {"name": "code", "description": "The code to review", "required": true},
                    {"name": "language", "description": "Language of the snippet", "required": false}
                ]
            }),
            persona: "default".to_string(),
            group: "utility".to_string(),
        },
    )?;

    registry::upsert_prompt(
        engine.meta(),
        &PromptRecord {
            name: "summarize_sales".to_string(),
            description: "Ask for a narrative summary of recent sales.".to_string(),
            template: "Summarize the sales picture for {{ store }} in two sentences, calling out \
                       the strongest department."
                .to_string(),
            arguments_schema: json!({
                "arguments": [
                    {"name": "store", "description": "Store to focus on", "required": true}
                ]
            }),
            persona: "default".to_string(),
            group: "data".to_string(),
        },
    )?;

    Ok(())
}

fn seed_macros(engine: &Engine) -> EngineResult<()> {
    engine.install_macro(&MacroRecord {
        name: "safe_div".to_string(),
        description: "Division that yields NULL instead of dividing by zero.".to_string(),
        template: "{% macro safe_div(a, b) %}CASE WHEN {{ b }} = 0 THEN NULL ELSE {{ a }} * 1.0 / {{ b }} END{% endmacro %}"
            .to_string(),
        is_active: true,
    })
}

fn seed_icons(engine: &Engine) -> EngineResult<()> {
    registry::upsert_icon(
        engine.meta(),
        &IconRecord {
            icon_name: "default_chameleon".to_string(),
            mime_type: "image/svg+xml".to_string(),
            content: DEFAULT_ICON.to_string(),
        },
    )
}

fn seed_policies(engine: &Engine) -> EngineResult<()> {
    // Idempotence: the policy table has no natural key, so skip when any
    // row is already present.
    if !registry::active_policies(engine.meta())?.is_empty() {
        return Ok(());
    }
    registry::insert_policy(
        engine.meta(),
        &PolicyRecord {
            id: None,
            rule_type: "deny".to_string(),
            category: "function".to_string(),
            pattern: "system_shell*".to_string(),
            description: Some("Shell access is never exposed as a plugin.".to_string()),
            is_active: true,
        },
    )?;
    Ok(())
}
