//! Long-term key-value memory with history.
//!
//! Every value change appends a history row in the same commit as the
//! update; deletes are soft (`is_active` flips, history preserved).  When
//! access tracking is on, reads, writes, and deletes also append rows to
//! the access-audit table.

use rusqlite::{OptionalExtension, params};

use crate::error::EngineResult;
use crate::model::{NotebookChange, NotebookEntry};
use crate::store::{MetaStore, utc_now};

fn entry_from_row(row: &rusqlite::Row<'_>) -> Result<NotebookEntry, rusqlite::Error> {
    Ok(NotebookEntry {
        domain: row.get("domain")?,
        key: row.get("key")?,
        value: row.get("value")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
        is_active: row.get("is_active")?,
    })
}

/// Write (insert or update) an entry; the previous value, when any, lands
/// in the history table within the same transaction.
pub fn write(
    store: &MetaStore,
    domain: &str,
    key: &str,
    value: &str,
    who: &str,
    track_access: bool,
) -> EngineResult<()> {
    let now = utc_now();
    let tables = store.tables().clone();
    let mut conn = store.conn();
    let tx = conn.transaction()?;

    let old_value: Option<String> = tx
        .query_row(
            &format!(
                "SELECT value FROM {t} WHERE domain = ?1 AND key = ?2",
                t = tables.agent_notebook
            ),
            params![domain, key],
            |row| row.get(0),
        )
        .optional()?;

    tx.execute(
        &format!(
            "INSERT INTO {t} (domain, key, value, created_at, updated_at, updated_by, is_active)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, 1)
             ON CONFLICT(domain, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at,
                 updated_by = excluded.updated_by,
                 is_active = 1",
            t = tables.agent_notebook
        ),
        params![domain, key, value, now, who],
    )?;

    tx.execute(
        &format!(
            "INSERT INTO {t} (domain, key, old_value, new_value, changed_at, changed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            t = tables.notebook_history
        ),
        params![domain, key, old_value, value, now, who],
    )?;

    if track_access {
        append_access(&tx, &tables.notebook_audit, domain, key, "write", who, &now)?;
    }

    tx.commit()?;
    Ok(())
}

/// Read an active entry; inactive (soft-deleted) entries are invisible.
pub fn read(
    store: &MetaStore,
    domain: &str,
    key: &str,
    who: &str,
    track_access: bool,
) -> EngineResult<Option<NotebookEntry>> {
    let tables = store.tables().clone();
    let conn = store.conn();
    let entry = conn
        .query_row(
            &format!(
                "SELECT * FROM {t} WHERE domain = ?1 AND key = ?2 AND is_active = 1",
                t = tables.agent_notebook
            ),
            params![domain, key],
            entry_from_row,
        )
        .optional()?;

    if track_access {
        append_access(&conn, &tables.notebook_audit, domain, key, "read", who, &utc_now())?;
    }
    Ok(entry)
}

/// Soft-delete: flip `is_active` and record the deletion in history.
pub fn soft_delete(
    store: &MetaStore,
    domain: &str,
    key: &str,
    who: &str,
    track_access: bool,
) -> EngineResult<bool> {
    let now = utc_now();
    let tables = store.tables().clone();
    let mut conn = store.conn();
    let tx = conn.transaction()?;

    let old_value: Option<String> = tx
        .query_row(
            &format!(
                "SELECT value FROM {t} WHERE domain = ?1 AND key = ?2 AND is_active = 1",
                t = tables.agent_notebook
            ),
            params![domain, key],
            |row| row.get(0),
        )
        .optional()?;
    let Some(old_value) = old_value else {
        return Ok(false);
    };

    tx.execute(
        &format!(
            "UPDATE {t} SET is_active = 0, updated_at = ?3, updated_by = ?4
             WHERE domain = ?1 AND key = ?2",
            t = tables.agent_notebook
        ),
        params![domain, key, now, who],
    )?;
    tx.execute(
        &format!(
            "INSERT INTO {t} (domain, key, old_value, new_value, changed_at, changed_by)
             VALUES (?1, ?2, ?3, '', ?4, ?5)",
            t = tables.notebook_history
        ),
        params![domain, key, old_value, now, who],
    )?;
    if track_access {
        append_access(&tx, &tables.notebook_audit, domain, key, "delete", who, &now)?;
    }
    tx.commit()?;
    Ok(true)
}

/// Active entries in a domain.
pub fn list_domain(store: &MetaStore, domain: &str) -> EngineResult<Vec<NotebookEntry>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE domain = ?1 AND is_active = 1 ORDER BY key",
        t = store.tables().agent_notebook
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![domain], entry_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Change history for one entry, oldest first.
pub fn history(store: &MetaStore, domain: &str, key: &str) -> EngineResult<Vec<NotebookChange>> {
    let sql = format!(
        "SELECT id, domain, key, old_value, new_value, changed_at, changed_by
         FROM {t} WHERE domain = ?1 AND key = ?2 ORDER BY id",
        t = store.tables().notebook_history
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![domain, key], |row| {
        Ok(NotebookChange {
            id: row.get(0)?,
            domain: row.get(1)?,
            key: row.get(2)?,
            old_value: row.get(3)?,
            new_value: row.get(4)?,
            changed_at: row.get(5)?,
            changed_by: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Append an error summary to the self-correction domain, accumulating
/// onto any existing note.  Best-effort by contract: callers ignore the
/// result beyond logging.
pub fn append_self_correction(
    store: &MetaStore,
    tool_name: &str,
    summary: &str,
) -> EngineResult<()> {
    let key = format!("{tool_name}_error");
    let existing = read(store, "self_correction", &key, "engine", false)?;
    let value = match existing {
        Some(entry) => format!("{}\n{summary}", entry.value),
        None => summary.to_string(),
    };
    write(store, "self_correction", &key, &value, "engine", false)
}

fn append_access(
    conn: &rusqlite::Connection,
    table: &str,
    domain: &str,
    key: &str,
    access_type: &str,
    who: &str,
    when: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        &format!(
            "INSERT INTO {table} (domain, key, access_type, accessed_at, accessed_by)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![domain, key, access_type, when, who],
    )?;
    Ok(())
}
