//! End-to-end engine scenarios against in-memory stores.

use serde_json::{Map, Value, json};

use chameleon::config::Config;
use chameleon::engine::{Engine, ToolSpec};
use chameleon::model::CodeType;
use chameleon::{audit, registry, seed, vault};

fn memory_config() -> Config {
    let mut config = Config::default();
    config.metadata_database.url = ":memory:".to_string();
    config.data_database.url = ":memory:".to_string();
    config.features.self_correction = false;
    config
}

fn seeded_engine() -> Engine {
    let engine = Engine::from_config(&memory_config()).unwrap();
    seed::seed_all(&engine).unwrap();
    engine
}

fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn greet_round_trip_with_audit_row() {
    let engine = seeded_engine();

    let result = engine
        .execute("utility_greet", "default", &args(&[("name", json!("Alice"))]))
        .unwrap();
    assert_eq!(
        result,
        json!("Hello Alice! I am running from the database.")
    );

    let rows = audit::recent(engine.meta(), Some("utility_greet"), 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "SUCCESS");
    assert_eq!(rows[0].persona, "default");
}

#[test]
fn sales_summary_filters_by_department() {
    let engine = seeded_engine();

    let result = engine
        .execute(
            "data_get_sales_summary",
            "default",
            &args(&[("department", json!("Electronics"))]),
        )
        .unwrap();

    let groups = result.as_array().unwrap();
    assert_eq!(groups.len(), 1, "one (store, department) group expected");
    assert_eq!(groups[0]["department"], json!("Electronics"));

    // total_sales must equal the sum over matching raw rows.
    let raw = engine
        .execute(
            "get_sales_by_store",
            "default",
            &args(&[("store_name", json!("Store A"))]),
        )
        .unwrap();
    let expected: f64 = raw
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| row["department"] == json!("Electronics"))
        .map(|row| row["sales_amount"].as_f64().unwrap())
        .sum();
    let total = groups[0]["total_sales"].as_f64().unwrap();
    assert!((total - expected).abs() < 1e-9, "{total} != {expected}");
    assert_eq!(groups[0]["transaction_count"], json!(5));
}

#[test]
fn injection_attempt_binds_as_literal() {
    let engine = seeded_engine();

    let result = engine
        .execute(
            "get_sales_by_store",
            "default",
            &args(&[("store_name", json!("Electronics' OR '1'='1"))]),
        )
        .unwrap();
    assert_eq!(result, json!([]), "quoted injection must match zero rows");
}

#[test]
fn multi_statement_body_is_rejected_and_table_survives() {
    let engine = seeded_engine();

    // Install the hostile body behind the ingestion gate, simulating a row
    // written before validation existed.
    let body = "SELECT * FROM sales_per_day; DROP TABLE sales_per_day";
    let hash = vault::upsert(engine.meta(), body, CodeType::SqlSelect).unwrap();
    registry::upsert_tool(
        engine.meta(),
        &chameleon::model::ToolRecord {
            tool_name: "hostile".to_string(),
            persona: "default".to_string(),
            description: "multi-statement".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            active_hash_ref: hash,
            is_auto_created: false,
            group: "data".to_string(),
            icon_name: None,
            manual: None,
        },
    )
    .unwrap();

    let err = engine.execute("hostile", "default", &Map::new()).unwrap_err();
    assert_eq!(err.code(), "SQL_VALIDATION");
    assert!(err.to_string().contains("MULTI_STATEMENT"));

    // The table still exists with all 15 rows.
    let rows = engine
        .execute("data_get_sales_summary", "default", &Map::new())
        .unwrap();
    let total: i64 = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["transaction_count"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 15);

    // The rejection is audited as a failure.
    let failure = audit::last_failure(engine.meta(), Some("hostile")).unwrap().unwrap();
    assert!(failure.error_detail.unwrap().contains("SQL_VALIDATION"));
}

#[test]
fn chain_forward_reference_runs_nothing() {
    let engine = seeded_engine();

    let steps = json!([
        {"id": "s1", "tool": "echo", "args": {"x": "${s2}"}},
        {"id": "s2", "tool": "echo", "args": {"x": "hi"}},
    ]);
    let err = engine
        .execute("system_run_chain", "default", &args(&[("steps", steps)]))
        .unwrap_err();
    assert_eq!(err.code(), "DAG_VIOLATION");
    assert!(err.to_string().contains("s2"));

    // No echo invocation ever reached the engine.
    assert!(audit::recent(engine.meta(), Some("echo"), 10).unwrap().is_empty());
}

#[test]
fn chain_composes_and_audits_each_step() {
    let engine = seeded_engine();

    let steps = json!([
        {"id": "s1", "tool": "echo", "args": {"x": "hi"}},
        {"id": "s2", "tool": "utility_uppercase", "args": {"text": "${s1} there"}},
    ]);
    let report = engine
        .execute("system_run_chain", "default", &args(&[("steps", steps)]))
        .unwrap();
    assert_eq!(report["status"], json!("SUCCESS"));
    assert_eq!(report["state"]["s2"], json!("HI THERE"));

    assert_eq!(audit::recent(engine.meta(), Some("echo"), 10).unwrap().len(), 1);
    assert_eq!(
        audit::recent(engine.meta(), Some("system_run_chain"), 10).unwrap().len(),
        1
    );
}

#[test]
fn chain_partial_failure_reports_progress() {
    let engine = seeded_engine();

    let steps = json!([
        {"id": "s1", "tool": "echo", "args": {"x": "ok"}},
        {"id": "s2", "tool": "no_such_tool", "args": {}},
        {"id": "s3", "tool": "echo", "args": {"x": "never"}},
    ]);
    let report = engine
        .execute("system_run_chain", "default", &args(&[("steps", steps)]))
        .unwrap();
    assert_eq!(report["status"], json!("FAILED"));
    assert_eq!(report["failed_step"]["id"], json!("s2"));
    assert_eq!(report["executed_steps"].as_array().unwrap().len(), 1);
    assert!(report["error"].as_str().unwrap().contains("no_such_tool"));
    // s3 never ran.
    assert_eq!(audit::recent(engine.meta(), Some("echo"), 10).unwrap().len(), 1);
}

#[test]
fn offline_mode_fails_sql_cleanly_then_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not_here").join("data.db");

    let mut config = memory_config();
    config.data_database.url = missing.display().to_string();
    let engine = Engine::from_config(&config).unwrap();
    seed::seed_all(&engine).unwrap();
    assert!(!engine.data_connected());

    // Listing still works offline.
    let tools = engine.list_tools("default").unwrap();
    assert!(tools.iter().any(|t| t.name == "data_get_sales_summary"));

    // SQL tools refuse with a reconnect hint.
    let err = engine
        .execute("data_get_sales_summary", "default", &Map::new())
        .unwrap_err();
    assert_eq!(err.code(), "OFFLINE");
    assert!(err.to_string().contains("reconnect_db"));

    // Bring the host up and reconnect through the system tool.
    std::fs::create_dir_all(missing.parent().unwrap()).unwrap();
    let message = engine
        .execute("reconnect_db", "default", &Map::new())
        .unwrap();
    assert!(message.as_str().unwrap().contains("Successfully reconnected"));
    assert!(engine.data_connected());

    // Retry succeeds once sample data is in place.
    seed::seed_sample_data(&engine.data().unwrap()).unwrap();
    let rows = engine
        .execute("data_get_sales_summary", "default", &Map::new())
        .unwrap();
    assert!(!rows.as_array().unwrap().is_empty());
}

#[test]
fn temporary_tools_stay_in_process_and_cap_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = memory_config();
    config.metadata_database.url = dir.path().join("meta.db").display().to_string();
    config.data_database.url = dir.path().join("data.db").display().to_string();

    let engine = Engine::from_config(&config).unwrap();
    seed::seed_all(&engine).unwrap();

    let creation = engine
        .execute(
            "system_create_temp_tool",
            "default",
            &args(&[
                ("tool_name", json!("probe_sales")),
                ("description", json!("peek at sales")),
                ("sql_template", json!("SELECT * FROM sales_per_day LIMIT 500")),
            ]),
        )
        .unwrap();
    assert!(creation["message"].as_str().unwrap().contains("3 rows"));

    // Enforced LIMIT 3 replaces the requested LIMIT 500.
    let rows = engine.execute("probe_sales", "default", &Map::new()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 3);

    // Listed with the temp marker for its persona only.
    let listed = engine.list_tools("default").unwrap();
    let probe = listed.iter().find(|t| t.name == "probe_sales").unwrap();
    assert!(probe.description.starts_with("[TEMP-TEST]"));
    assert!(!engine.list_tools("analyst").unwrap().iter().any(|t| t.name == "probe_sales"));

    // Never persisted: a fresh engine over the same database has no trace.
    let fresh = Engine::from_config(&config).unwrap();
    assert!(!fresh.list_tools("default").unwrap().iter().any(|t| t.name == "probe_sales"));
    let err = fresh.execute("probe_sales", "default", &Map::new()).unwrap_err();
    assert_eq!(err.code(), "TOOL_NOT_FOUND");
}

#[test]
fn auto_created_tools_get_marker_and_limit() {
    let engine = seeded_engine();

    engine
        .execute(
            "system_create_sql_tool",
            "default",
            &args(&[
                ("tool_name", json!("all_sales")),
                ("description", json!("every sales row")),
                ("sql_template", json!("SELECT * FROM sales_per_day")),
            ]),
        )
        .unwrap();

    let listed = engine.list_tools("default").unwrap();
    let created = listed.iter().find(|t| t.name == "all_sales").unwrap();
    assert!(created.description.starts_with("[AUTO-BUILD]"));

    // The enforced cap is appended (1000 > 15 rows here, so all rows return).
    let rows = engine.execute("all_sales", "default", &Map::new()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 15);

    // And the creator refuses non-SELECT bodies at ingestion.
    let err = engine
        .execute(
            "system_create_sql_tool",
            "default",
            &args(&[
                ("tool_name", json!("evil")),
                ("description", json!("nope")),
                ("sql_template", json!("DELETE FROM sales_per_day")),
            ]),
        )
        .unwrap_err();
    assert_eq!(err.code(), "SQL_VALIDATION");
}

#[test]
fn integrity_error_on_tampered_vault_row() {
    let engine = seeded_engine();

    let tool = registry::get_tool(engine.meta(), "utility_greet", "default")
        .unwrap()
        .unwrap();
    engine
        .meta()
        .conn()
        .execute(
            "UPDATE codevault SET code_blob = '{\"plugin\": \"echo\"}' WHERE hash = ?1",
            rusqlite::params![tool.active_hash_ref.as_str()],
        )
        .unwrap();

    let err = engine
        .execute("utility_greet", "default", &args(&[("name", json!("Eve"))]))
        .unwrap_err();
    assert_eq!(err.code(), "INTEGRITY");
}

#[test]
fn macros_expand_in_sql_tools() {
    let engine = seeded_engine();

    engine
        .execute(
            "system_create_sql_tool",
            "default",
            &args(&[
                ("tool_name", json!("avg_ticket")),
                ("description", json!("average with safe division")),
                (
                    "sql_template",
                    json!(
                        "SELECT {{ safe_div('SUM(sales_amount)', 'COUNT(*)') }} AS avg_ticket FROM sales_per_day"
                    ),
                ),
            ]),
        )
        .unwrap();

    let rows = engine.execute("avg_ticket", "default", &Map::new()).unwrap();
    assert!(rows[0]["avg_ticket"].as_f64().unwrap() > 0.0);
}

#[test]
fn macro_creator_registers_and_invalidates_cache() {
    let engine = seeded_engine();

    // Prime the preamble cache, then register a new macro through the tool.
    assert!(engine.macro_preamble().unwrap().contains("safe_div"));
    engine
        .execute(
            "system_create_macro",
            "default",
            &args(&[
                ("name", json!("pct")),
                ("description", json!("percentage of a total")),
                (
                    "template",
                    json!("{% macro pct(part, total) %}100.0 * {{ part }} / {{ total }}{% endmacro %}"),
                ),
            ]),
        )
        .unwrap();
    assert!(engine.macro_preamble().unwrap().contains("pct"));

    // Malformed macro bodies are rejected.
    let err = engine
        .execute(
            "system_create_macro",
            "default",
            &args(&[
                ("name", json!("bad")),
                ("description", json!("broken")),
                ("template", json!("SELECT 1")),
            ]),
        )
        .unwrap_err();
    assert_eq!(err.code(), "BAD_ARGUMENTS");
}

#[test]
fn notebook_tool_round_trip_with_history() {
    let engine = seeded_engine();

    engine
        .execute(
            "system_notebook",
            "default",
            &args(&[
                ("action", json!("write")),
                ("domain", json!("user_prefs")),
                ("key", json!("tone")),
                ("value", json!("concise")),
            ]),
        )
        .unwrap();
    engine
        .execute(
            "system_notebook",
            "default",
            &args(&[
                ("action", json!("write")),
                ("domain", json!("user_prefs")),
                ("key", json!("tone")),
                ("value", json!("detailed")),
            ]),
        )
        .unwrap();

    let read = engine
        .execute(
            "system_notebook",
            "default",
            &args(&[
                ("action", json!("read")),
                ("domain", json!("user_prefs")),
                ("key", json!("tone")),
            ]),
        )
        .unwrap();
    assert_eq!(read["value"], json!("detailed"));

    let history = engine
        .execute(
            "system_notebook",
            "default",
            &args(&[
                ("action", json!("history")),
                ("domain", json!("user_prefs")),
                ("key", json!("tone")),
            ]),
        )
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[test]
fn self_correction_hook_records_failures() {
    let mut config = memory_config();
    config.features.self_correction = true;
    let engine = Engine::from_config(&config).unwrap();
    seed::seed_all(&engine).unwrap();

    let _ = engine.execute("utility_greet", "default", &Map::new()).unwrap_err();

    let note = chameleon::notebook::read(
        engine.meta(),
        "self_correction",
        "utility_greet_error",
        "test",
        false,
    )
    .unwrap()
    .unwrap();
    assert!(note.value.contains("BAD_ARGUMENTS"));
}

#[test]
fn verifier_flips_manual_example_flags() {
    let engine = seeded_engine();

    let summary = engine
        .execute(
            "system_verify_examples",
            "default",
            &args(&[("tool_name", json!("utility_greet"))]),
        )
        .unwrap();
    assert_eq!(summary["verified"], json!(1));
    assert_eq!(summary["failed"], json!(0));

    let tool = registry::get_tool(engine.meta(), "utility_greet", "default")
        .unwrap()
        .unwrap();
    assert_eq!(tool.manual.unwrap()["examples"][0]["verified"], json!(true));
}

#[test]
fn inspect_tool_surfaces_the_manual() {
    let engine = seeded_engine();

    let report = engine
        .execute(
            "system_inspect_tool",
            "default",
            &args(&[("tool_name", json!("utility_greet"))]),
        )
        .unwrap();
    assert_eq!(report["tool_name"], json!("utility_greet"));
    assert_eq!(report["group"], json!("utility"));
    assert_eq!(report["is_auto_created"], json!(false));
    assert!(report["input_schema"]["properties"]["name"].is_object());
    // The manual round-trips: usage guide, examples with verified flags,
    // pitfalls, and error codes all come back to the caller.
    let manual = &report["manual"];
    assert!(manual["usage_guide"].as_str().unwrap().contains("name"));
    assert_eq!(manual["examples"][0]["verified"], json!(false));
    assert!(manual["pitfalls"].is_array());

    // Verification then shows up on the next inspection.
    engine
        .execute(
            "system_verify_examples",
            "default",
            &args(&[("tool_name", json!("utility_greet"))]),
        )
        .unwrap();
    let report = engine
        .execute(
            "system_inspect_tool",
            "default",
            &args(&[("tool_name", json!("utility_greet"))]),
        )
        .unwrap();
    assert_eq!(report["manual"]["examples"][0]["verified"], json!(true));

    // Unknown tools fail with the stable code.
    let err = engine
        .execute(
            "system_inspect_tool",
            "default",
            &args(&[("tool_name", json!("no_such_tool"))]),
        )
        .unwrap_err();
    assert_eq!(err.code(), "TOOL_NOT_FOUND");
}

#[test]
fn resource_bridge_reads_through_the_tool_surface() {
    let engine = seeded_engine();

    let content = engine
        .execute(
            "read_resource",
            "default",
            &args(&[("uri", json!("docs://chameleon/welcome"))]),
        )
        .unwrap();
    assert!(content.as_str().unwrap().contains("Chameleon Engine"));

    // Unknown URIs answer with the available catalogue instead of failing,
    // so a tools-only client can self-correct.
    let reply = engine
        .execute(
            "read_resource",
            "default",
            &args(&[("uri", json!("docs://missing"))]),
        )
        .unwrap();
    let text = reply.as_str().unwrap();
    assert!(text.contains("Resource not found: docs://missing"));
    assert!(text.contains("docs://chameleon/welcome"));
    assert!(text.contains("data://sales/recent"));

    // URI completion comes from the live catalogue.
    let suggestions = engine.complete("read_resource", "default", "uri", "docs://");
    assert_eq!(suggestions, vec!["docs://chameleon/welcome".to_string()]);
}

#[test]
fn prompt_creator_registers_a_renderable_prompt() {
    let engine = seeded_engine();

    let result = engine
        .execute(
            "create_new_prompt",
            "default",
            &args(&[
                ("name", json!("explain_sql")),
                ("description", json!("Explain a SQL statement in plain words")),
                ("template", json!("Explain what this SQL does:\n\n{{ sql }}")),
                (
                    "arguments",
                    json!([{"name": "sql", "description": "Statement to explain", "required": true}]),
                ),
            ]),
        )
        .unwrap();
    assert!(result["message"].as_str().unwrap().contains("explain_sql"));

    let rendered = engine
        .render_prompt("explain_sql", &args(&[("sql", json!("SELECT 1"))]))
        .unwrap();
    assert!(rendered.text.contains("SELECT 1"));
    let err = engine.render_prompt("explain_sql", &Map::new()).unwrap_err();
    assert!(err.to_string().contains("sql"));

    // Broken templates are rejected at ingestion.
    let err = engine
        .execute(
            "create_new_prompt",
            "default",
            &args(&[
                ("name", json!("broken")),
                ("description", json!("nope")),
                ("template", json!("{% if %}")),
            ]),
        )
        .unwrap_err();
    assert_eq!(err.code(), "TEMPLATE");
}

#[test]
fn resource_creator_registers_a_readable_static_resource() {
    let engine = seeded_engine();

    engine
        .execute(
            "create_new_resource",
            "default",
            &args(&[
                ("uri", json!("memo://project_notes")),
                ("name", json!("Project Notes")),
                ("description", json!("Scratch notes for the current project")),
                ("content", json!("Remember to reconcile January sales.")),
            ]),
        )
        .unwrap();

    // Visible to listings and readable both natively and via the bridge.
    let listed = engine.list_resources("default").unwrap();
    assert!(listed.iter().any(|r| r.uri == "memo://project_notes"));

    let (content, mime) = engine.read_resource("memo://project_notes", "default").unwrap();
    assert_eq!(content, "Remember to reconcile January sales.");
    assert_eq!(mime, "text/plain");

    let bridged = engine
        .execute(
            "read_resource",
            "default",
            &args(&[("uri", json!("memo://project_notes"))]),
        )
        .unwrap();
    assert_eq!(bridged, json!("Remember to reconcile January sales."));

    // Upserting the same URI replaces the content.
    engine
        .execute(
            "create_new_resource",
            "default",
            &args(&[
                ("uri", json!("memo://project_notes")),
                ("name", json!("Project Notes")),
                ("description", json!("Scratch notes for the current project")),
                ("content", json!("January sales reconciled.")),
            ]),
        )
        .unwrap();
    let (content, _) = engine.read_resource("memo://project_notes", "default").unwrap();
    assert_eq!(content, "January sales reconciled.");
}

#[test]
fn resources_read_static_and_dynamic() {
    let engine = seeded_engine();

    let (content, mime) = engine
        .read_resource("docs://chameleon/welcome", "default")
        .unwrap();
    assert!(content.contains("Chameleon Engine"));
    assert_eq!(mime, "text/plain");

    let (report, mime) = engine.read_resource("data://sales/recent", "default").unwrap();
    assert_eq!(mime, "application/json");
    let rows: Value = serde_json::from_str(&report).unwrap();
    assert!(rows.as_array().unwrap().len() <= 10);
    assert!(rows[0].get("daily_total").is_some());

    let err = engine.read_resource("docs://missing", "default").unwrap_err();
    assert_eq!(err.code(), "RESOURCE_NOT_FOUND");
}

#[test]
fn prompts_render_and_enforce_required_args() {
    let engine = seeded_engine();

    let rendered = engine
        .render_prompt(
            "review_code",
            &args(&[("code", json!("fn main() {}")), ("language", json!("Rust"))]),
        )
        .unwrap();
    assert!(rendered.text.contains("Rust"));
    assert!(rendered.text.contains("fn main() {}"));

    let err = engine.render_prompt("review_code", &Map::new()).unwrap_err();
    assert!(err.to_string().contains("code"));

    let err = engine.render_prompt("nope", &Map::new()).unwrap_err();
    assert_eq!(err.code(), "PROMPT_NOT_FOUND");
}

#[test]
fn completion_degrades_to_empty() {
    let engine = seeded_engine();

    let suggestions = engine.complete("utility_greet", "default", "name", "Al");
    assert_eq!(suggestions, vec!["Alice".to_string()]);

    // SQL tools and unknown tools yield no suggestions.
    assert!(engine.complete("data_get_sales_summary", "default", "store_name", "S").is_empty());
    assert!(engine.complete("missing", "default", "x", "").is_empty());
}

#[test]
fn unknown_tool_fails_with_stable_code() {
    let engine = seeded_engine();
    let err = engine.execute("nonexistent", "default", &Map::new()).unwrap_err();
    assert_eq!(err.code(), "TOOL_NOT_FOUND");
    assert!(err.to_string().contains("nonexistent"));

    // Lookups are persona-scoped.
    let err = engine
        .execute("utility_greet", "other_persona", &args(&[("name", json!("A"))]))
        .unwrap_err();
    assert_eq!(err.code(), "TOOL_NOT_FOUND");
}

#[test]
fn seeding_twice_is_idempotent() {
    let engine = seeded_engine();
    let before = engine.list_tools("default").unwrap().len();
    seed::seed_all(&engine).unwrap();
    let after = engine.list_tools("default").unwrap().len();
    assert_eq!(before, after);

    // Vault rows are stable too.
    let count: i64 = engine
        .meta()
        .conn()
        .query_row("SELECT COUNT(*) FROM codevault", [], |r| r.get(0))
        .unwrap();
    seed::seed_all(&engine).unwrap();
    let again: i64 = engine
        .meta()
        .conn()
        .query_row("SELECT COUNT(*) FROM codevault", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, again);
}

#[test]
fn every_registered_tool_hash_resolves() {
    let engine = seeded_engine();
    for tool in registry::list_tools(engine.meta(), "default", None).unwrap() {
        let entry = vault::get(engine.meta(), &tool.active_hash_ref)
            .unwrap_or_else(|e| panic!("{}: {e}", tool.tool_name));
        entry.verify().unwrap();
    }
}

#[test]
fn dashboard_blobs_are_stored_but_never_executed() {
    let engine = seeded_engine();
    let hash = vault::upsert(engine.meta(), "{\"layout\": []}", CodeType::Dashboard).unwrap();
    registry::upsert_tool(
        engine.meta(),
        &chameleon::model::ToolRecord {
            tool_name: "sales_dashboard".to_string(),
            persona: "default".to_string(),
            description: "dashboard".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            active_hash_ref: hash,
            is_auto_created: false,
            group: "ui".to_string(),
            icon_name: None,
            manual: None,
        },
    )
    .unwrap();

    let err = engine.execute("sales_dashboard", "default", &Map::new()).unwrap_err();
    assert_eq!(err.code(), "TOOL_RAISED");
    assert!(err.to_string().contains("UI adapter"));
}

#[test]
fn install_tool_rejects_unregistered_plugin_keys() {
    let engine = seeded_engine();
    let spec = ToolSpec {
        tool_name: "ghost".to_string(),
        persona: "default".to_string(),
        description: "no implementation".to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
        is_auto_created: false,
        group: "system".to_string(),
        icon_name: None,
        manual: None,
    };
    let err = engine
        .install_tool(&spec, "{\"plugin\": \"not_registered\"}", CodeType::Procedural)
        .unwrap_err();
    assert_eq!(err.code(), "NO_TOOL_CLASS");

    // Policy-denied keys are rejected even if they were registered.
    let err = engine
        .install_tool(&spec, "{\"plugin\": \"system_shell_exec\"}", CodeType::Procedural)
        .unwrap_err();
    assert_eq!(err.code(), "POLICY_DENIED");
}
