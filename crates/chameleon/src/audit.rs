//! Execution audit log.
//!
//! Every tool invocation produces exactly one row, written through the
//! metadata store's dedicated audit connection so the row persists even
//! when the tool's own writes roll back.  Logging failures never affect
//! the call outcome.

use rusqlite::params;
use serde_json::{Map, Value};

use crate::error::EngineResult;
use crate::model::{ExecStatus, LogRecord};
use crate::store::{MetaStore, utc_now};

/// Result summaries are capped at roughly this many characters.
const SUMMARY_LIMIT: usize = 2000;

/// Truncate on a char boundary and mark the cut.
fn truncate_summary(text: &str) -> String {
    if text.chars().count() <= SUMMARY_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(SUMMARY_LIMIT).collect();
    format!("{cut}... (truncated)")
}

fn arguments_json(arguments: &Map<String, Value>) -> String {
    match serde_json::to_string(&Value::Object(arguments.clone())) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("failed to serialize audit arguments: {e}");
            format!("{{\"_serialization_error\": {:?}}}", format!("{arguments:?}"))
        }
    }
}

/// Append a SUCCESS row.
pub fn log_success(
    store: &MetaStore,
    tool_name: &str,
    persona: &str,
    arguments: &Map<String, Value>,
    result: &Value,
) {
    let summary = match result {
        Value::String(s) => truncate_summary(s),
        other => truncate_summary(&other.to_string()),
    };
    write_row(store, tool_name, persona, arguments, ExecStatus::Success, &summary, None);
}

/// Append a FAILURE row carrying the full error detail.
pub fn log_failure(
    store: &MetaStore,
    tool_name: &str,
    persona: &str,
    arguments: &Map<String, Value>,
    error_detail: &str,
) {
    write_row(
        store,
        tool_name,
        persona,
        arguments,
        ExecStatus::Failure,
        "Execution failed - see error_detail",
        Some(error_detail),
    );
}

fn write_row(
    store: &MetaStore,
    tool_name: &str,
    persona: &str,
    arguments: &Map<String, Value>,
    status: ExecStatus,
    summary: &str,
    error_detail: Option<&str>,
) {
    let sql = format!(
        "INSERT INTO {t} (timestamp, tool_name, persona, arguments, status,
                          result_summary, error_detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        t = store.tables().execution_log
    );
    let outcome = store.audit_conn().execute(
        &sql,
        params![
            utc_now(),
            tool_name,
            persona,
            arguments_json(arguments),
            status.as_str(),
            summary,
            error_detail,
        ],
    );
    if let Err(e) = outcome {
        tracing::warn!("failed to write execution log row for '{tool_name}': {e}");
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> Result<LogRecord, rusqlite::Error> {
    let args_text: String = row.get("arguments")?;
    Ok(LogRecord {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        tool_name: row.get("tool_name")?,
        persona: row.get("persona")?,
        arguments: serde_json::from_str(&args_text).unwrap_or(Value::Null),
        status: row.get("status")?,
        result_summary: row.get("result_summary")?,
        error_detail: row.get("error_detail")?,
    })
}

/// Rows for a tool (or all tools), newest first.
pub fn recent(
    store: &MetaStore,
    tool_name: Option<&str>,
    limit: u32,
) -> EngineResult<Vec<LogRecord>> {
    let sql = format!(
        "SELECT * FROM {t}
         WHERE (?1 IS NULL OR tool_name = ?1)
         ORDER BY timestamp DESC, id DESC LIMIT ?2",
        t = store.tables().execution_log
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![tool_name, limit], record_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The most recent FAILURE row, optionally scoped to one tool.
pub fn last_failure(store: &MetaStore, tool_name: Option<&str>) -> EngineResult<Option<LogRecord>> {
    let sql = format!(
        "SELECT * FROM {t}
         WHERE status = 'FAILURE' AND (?1 IS NULL OR tool_name = ?1)
         ORDER BY timestamp DESC, id DESC LIMIT 1",
        t = store.tables().execution_log
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![tool_name], record_from_row)?;
    Ok(rows.next().transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, TableNames};
    use serde_json::json;

    fn memory_store() -> MetaStore {
        MetaStore::open(
            &DatabaseConfig {
                url: ":memory:".to_string(),
                schema: None,
            },
            &TableNames::default(),
        )
        .unwrap()
    }

    fn args() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), json!("Alice"));
        map
    }

    #[test]
    fn success_row_is_written() {
        let store = memory_store();
        log_success(&store, "utility_greet", "default", &args(), &json!("Hello Alice!"));

        let rows = recent(&store, Some("utility_greet"), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "SUCCESS");
        assert_eq!(rows[0].result_summary, "Hello Alice!");
        assert_eq!(rows[0].arguments["name"], json!("Alice"));
    }

    #[test]
    fn failure_row_carries_detail() {
        let store = memory_store();
        log_failure(&store, "bad_tool", "default", &args(), "TOOL_RAISED: boom");

        let failure = last_failure(&store, None).unwrap().unwrap();
        assert_eq!(failure.tool_name, "bad_tool");
        assert_eq!(failure.error_detail.as_deref(), Some("TOOL_RAISED: boom"));
    }

    #[test]
    fn long_results_are_truncated() {
        let store = memory_store();
        let long = "x".repeat(5000);
        log_success(&store, "t", "default", &Map::new(), &json!(long));

        let rows = recent(&store, None, 1).unwrap();
        assert!(rows[0].result_summary.ends_with("... (truncated)"));
        assert!(rows[0].result_summary.chars().count() < 2100);
    }

    #[test]
    fn row_survives_work_transaction_rollback() {
        let store = memory_store();
        {
            // Simulate a failing tool: its work transaction rolls back, and
            // the engine then records the failure on the audit connection.
            let mut conn = store.conn();
            let tx = conn.transaction().unwrap();
            tx.execute(
                "INSERT INTO agentnotebook (domain, key, value, created_at, updated_at, updated_by)
                 VALUES ('d', 'k', 'v', 't', 't', 'test')",
                [],
            )
            .unwrap();
            drop(tx); // rollback
        }
        log_failure(&store, "rolled_back", "default", &Map::new(), "detail");

        let rows = recent(&store, Some("rolled_back"), 10).unwrap();
        assert_eq!(rows.len(), 1, "audit row must persist across rollback");
        let notebook_count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM agentnotebook", [], |r| r.get(0))
            .unwrap();
        assert_eq!(notebook_count, 0, "work transaction rolled back");
    }

    #[test]
    fn last_failure_scopes_by_tool() {
        let store = memory_store();
        log_failure(&store, "a", "default", &Map::new(), "err-a");
        log_failure(&store, "b", "default", &Map::new(), "err-b");

        assert_eq!(
            last_failure(&store, Some("a")).unwrap().unwrap().error_detail.as_deref(),
            Some("err-a")
        );
        assert!(last_failure(&store, Some("zzz")).unwrap().is_none());
    }
}
