//! Dual-store persistence over SQLite.
//!
//! Both stores wrap a `Connection` behind a mutex, the same discipline as a
//! single-connection session store: acquire, run the statement, release.
//! Callers run on blocking threads; the async adapter bridges with
//! `spawn_blocking`.
//!
//! The metadata store additionally owns a **second** connection dedicated
//! to the execution log so audit rows commit independently of whatever the
//! work connection is doing (including mid-rollback).

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{DatabaseConfig, TableNames};
use crate::error::EngineResult;
use crate::schema;

/// Counter for naming shared in-memory databases, so each `:memory:` store
/// gets its own database that both of its connections can see.
static MEM_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Resolve a configured database URL into something rusqlite can open.
///
/// Accepts `sqlite:///path`, `sqlite://path`, `sqlite:path`, a plain path,
/// and `:memory:`.  In-memory databases are rewritten to a uniquely named
/// shared-cache URI because the metadata store opens two connections.
fn resolve_sqlite_target(url: &str) -> (String, OpenFlags) {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    if path == ":memory:" || path.is_empty() {
        let n = MEM_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        (
            format!("file:chameleon_mem_{n}?mode=memory&cache=shared"),
            OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
        )
    } else {
        (path.to_string(), OpenFlags::default())
    }
}

fn open_connection(target: &str, flags: OpenFlags) -> EngineResult<Connection> {
    let conn = Connection::open_with_flags(target, flags)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

/// The metadata store: registries, vault, notebook, and the execution log.
#[derive(Clone)]
pub struct MetaStore {
    conn: Arc<Mutex<Connection>>,
    audit_conn: Arc<Mutex<Connection>>,
    tables: Arc<TableNames>,
}

impl MetaStore {
    /// Open (and if needed create) the metadata store.  Failure here is
    /// fatal for the server.
    pub fn open(db: &DatabaseConfig, tables: &TableNames) -> EngineResult<Self> {
        let (target, flags) = resolve_sqlite_target(&db.url);
        let conn = open_connection(&target, flags)?;
        let tables = tables.qualified(db.schema.as_deref());
        schema::init_meta_schema(&conn, &tables)?;
        // Opened second so the schema exists before any audit write.
        let audit_conn = open_connection(&target, flags)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            audit_conn: Arc::new(Mutex::new(audit_conn)),
            tables: Arc::new(tables),
        })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Lock the work connection.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Lock the dedicated audit connection.  Commits here are independent
    /// of the work connection's transaction state.
    pub fn audit_conn(&self) -> MutexGuard<'_, Connection> {
        self.audit_conn.lock()
    }
}

/// The data store: business tables queried by SQL-typed tools.
#[derive(Clone)]
pub struct DataStore {
    conn: Arc<Mutex<Connection>>,
    tables: Arc<TableNames>,
}

impl DataStore {
    /// Open the data store and ensure the sample schema exists.
    pub fn open(db: &DatabaseConfig, tables: &TableNames) -> EngineResult<Self> {
        let (target, flags) = resolve_sqlite_target(&db.url);
        let conn = open_connection(&target, flags)?;
        let tables = tables.qualified(db.schema.as_deref());
        schema::init_data_schema(&conn, &tables)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tables: Arc::new(tables),
        })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run a validated SELECT with `:name` placeholders bound from the
    /// argument map, returning all rows as JSON objects.
    ///
    /// Values only ever reach SQL through binding; the argument map is the
    /// single source of parameters.
    pub fn query(&self, sql: &str, args: &Map<String, Value>) -> EngineResult<Vec<Value>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;

        for index in 1..=stmt.parameter_count() {
            let key = match stmt.parameter_name(index) {
                Some(name) => name.trim_start_matches([':', '@', '$']).to_string(),
                None => continue,
            };
            if let Some(value) = args.get(key.as_str()) {
                bind_json_value(&mut stmt, index, value)?;
            }
            // Placeholders without a matching argument stay NULL, the
            // SQLite default for unbound parameters.
        }

        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = Map::new();
            for (i, column) in column_names.iter().enumerate() {
                object.insert(column.clone(), column_to_json(row.get_ref(i)?));
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }
}

fn bind_json_value(
    stmt: &mut rusqlite::Statement<'_>,
    index: usize,
    value: &Value,
) -> EngineResult<()> {
    match value {
        Value::Null => stmt.raw_bind_parameter(index, rusqlite::types::Null)?,
        Value::Bool(b) => stmt.raw_bind_parameter(index, *b)?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                stmt.raw_bind_parameter(index, i)?;
            } else {
                stmt.raw_bind_parameter(index, n.as_f64().unwrap_or(f64::NAN))?;
            }
        }
        Value::String(s) => stmt.raw_bind_parameter(index, s.as_str())?,
        // Structured values are bound as their JSON text.
        other => stmt.raw_bind_parameter(index, other.to_string())?,
    }
    Ok(())
}

fn column_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            use base64::Engine as _;
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    }
}

/// Current UTC timestamp in RFC 3339 with microsecond granularity.
pub fn utc_now() -> String {
    let now = time::OffsetDateTime::now_utc();
    // Truncate to microseconds; RFC 3339 formatting keeps the fraction.
    let micros = now.replace_nanosecond((now.nanosecond() / 1_000) * 1_000);
    micros
        .unwrap_or(now)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

impl std::fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStore").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_db() -> DatabaseConfig {
        DatabaseConfig {
            url: ":memory:".to_string(),
            schema: None,
        }
    }

    #[test]
    fn url_forms_resolve() {
        assert_eq!(resolve_sqlite_target("sqlite:///tmp/a.db").0, "tmp/a.db");
        assert_eq!(resolve_sqlite_target("sqlite://b.db").0, "b.db");
        assert_eq!(resolve_sqlite_target("c.db").0, "c.db");
        assert!(resolve_sqlite_target(":memory:").0.contains("mode=memory"));
    }

    #[test]
    fn memory_meta_store_shares_between_connections() {
        let store = MetaStore::open(&memory_db(), &TableNames::default()).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO codevault (hash, code_blob, code_type) VALUES ('h', 'c', 'sql-select')",
                [],
            )
            .unwrap();
        // Visible through the audit connection: same database.
        let count: i64 = store
            .audit_conn()
            .query_row("SELECT COUNT(*) FROM codevault", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn data_store_binds_named_parameters() {
        let store = DataStore::open(&memory_db(), &TableNames::default()).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO sales_per_day (business_date, store_name, department, sales_amount)
                 VALUES ('2025-01-01', 'Store A', 'Electronics', 100.5)",
                [],
            )
            .unwrap();

        let mut args = Map::new();
        args.insert("store_name".to_string(), json!("Store A"));
        let rows = store
            .query(
                "SELECT store_name, sales_amount FROM sales_per_day WHERE store_name = :store_name",
                &args,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["store_name"], json!("Store A"));
        assert_eq!(rows[0]["sales_amount"], json!(100.5));
    }

    #[test]
    fn bound_values_are_literals_not_sql() {
        let store = DataStore::open(&memory_db(), &TableNames::default()).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO sales_per_day (business_date, store_name, department, sales_amount)
                 VALUES ('2025-01-01', 'Store A', 'Electronics', 1.0)",
                [],
            )
            .unwrap();

        let mut args = Map::new();
        args.insert(
            "store_name".to_string(),
            json!("Electronics' OR '1'='1"),
        );
        let rows = store
            .query(
                "SELECT * FROM sales_per_day WHERE store_name = :store_name",
                &args,
            )
            .unwrap();
        assert!(rows.is_empty(), "injection text must bind as a literal");
    }

    #[test]
    fn missing_placeholder_binds_null() {
        let store = DataStore::open(&memory_db(), &TableNames::default()).unwrap();
        let rows = store
            .query("SELECT :absent AS v", &Map::new())
            .unwrap();
        assert_eq!(rows[0]["v"], Value::Null);
    }

    #[test]
    fn utc_now_is_rfc3339() {
        let ts = utc_now();
        assert!(time::OffsetDateTime::parse(
            &ts,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }
}
