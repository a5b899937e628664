//! Schema initialization for both stores (additive evolution, no migrations).

use rusqlite::Connection;

use crate::config::TableNames;

/// Create the metadata-store tables if they do not exist.
pub fn init_meta_schema(conn: &Connection, t: &TableNames) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {code_vault} (
            hash TEXT PRIMARY KEY,
            code_blob TEXT NOT NULL,
            code_type TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {tool_registry} (
            tool_name TEXT NOT NULL,
            persona TEXT NOT NULL,
            description TEXT NOT NULL,
            input_schema TEXT NOT NULL,
            active_hash_ref TEXT NOT NULL,
            is_auto_created INTEGER NOT NULL DEFAULT 0,
            group_name TEXT NOT NULL,
            icon_name TEXT,
            manual TEXT,
            PRIMARY KEY (tool_name, persona)
        );

        CREATE TABLE IF NOT EXISTS {resource_registry} (
            uri TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            mime_type TEXT NOT NULL DEFAULT 'text/plain',
            is_dynamic INTEGER NOT NULL DEFAULT 0,
            static_content TEXT,
            active_hash_ref TEXT,
            persona TEXT NOT NULL DEFAULT 'default',
            group_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {prompt_registry} (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            template TEXT NOT NULL,
            arguments_schema TEXT NOT NULL,
            persona TEXT NOT NULL DEFAULT 'default',
            group_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {macro_registry} (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            template TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS {security_policy} (
            id INTEGER PRIMARY KEY,
            rule_type TEXT NOT NULL,
            category TEXT NOT NULL,
            pattern TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS {icon_registry} (
            icon_name TEXT PRIMARY KEY,
            mime_type TEXT NOT NULL,
            content TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {execution_log} (
            id INTEGER PRIMARY KEY,
            timestamp TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            persona TEXT NOT NULL,
            arguments TEXT NOT NULL,
            status TEXT NOT NULL,
            result_summary TEXT NOT NULL,
            error_detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_execution_log_tool
            ON {execution_log}(tool_name, timestamp);

        CREATE TABLE IF NOT EXISTS {agent_notebook} (
            domain TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            updated_by TEXT NOT NULL DEFAULT 'system',
            is_active INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (domain, key)
        );

        CREATE TABLE IF NOT EXISTS {notebook_history} (
            id INTEGER PRIMARY KEY,
            domain TEXT NOT NULL,
            key TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT NOT NULL,
            changed_at TEXT NOT NULL,
            changed_by TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notebook_history_entry
            ON {notebook_history}(domain, key, changed_at);

        CREATE TABLE IF NOT EXISTS {notebook_audit} (
            id INTEGER PRIMARY KEY,
            domain TEXT NOT NULL,
            key TEXT NOT NULL,
            access_type TEXT NOT NULL,
            accessed_at TEXT NOT NULL,
            accessed_by TEXT NOT NULL,
            context_data TEXT
        );
        "#,
        code_vault = t.code_vault,
        tool_registry = t.tool_registry,
        resource_registry = t.resource_registry,
        prompt_registry = t.prompt_registry,
        macro_registry = t.macro_registry,
        security_policy = t.security_policy,
        icon_registry = t.icon_registry,
        execution_log = t.execution_log,
        agent_notebook = t.agent_notebook,
        notebook_history = t.notebook_history,
        notebook_audit = t.notebook_audit,
    ))
}

/// Create the data-store tables if they do not exist.
pub fn init_data_schema(conn: &Connection, t: &TableNames) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {sales_per_day} (
            id INTEGER PRIMARY KEY,
            business_date TEXT NOT NULL,
            store_name TEXT NOT NULL,
            department TEXT NOT NULL,
            sales_amount REAL NOT NULL
        );
        "#,
        sales_per_day = t.sales_per_day,
    ))
}
