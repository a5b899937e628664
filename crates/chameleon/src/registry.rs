//! Registry persistence: tools, resources, prompts, macros, icons, and
//! security policies.
//!
//! Every kind follows the same contract: upsert by natural key (idempotent,
//! running the same upsert twice leaves the database unchanged), listing
//! filtered by persona and optionally group, and row-only deletion (vault
//! blobs are never cascaded).

use rusqlite::{OptionalExtension, params};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::hash::ContentHash;
use crate::model::{
    IconRecord, MacroRecord, PolicyRecord, PromptListing, PromptRecord, ResourceListing,
    ResourceRecord, ToolRecord,
};
use crate::store::MetaStore;

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

pub fn upsert_tool(store: &MetaStore, tool: &ToolRecord) -> EngineResult<()> {
    let sql = format!(
        "INSERT INTO {t} (tool_name, persona, description, input_schema, active_hash_ref,
                          is_auto_created, group_name, icon_name, manual)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(tool_name, persona) DO UPDATE SET
             description = excluded.description,
             input_schema = excluded.input_schema,
             active_hash_ref = excluded.active_hash_ref,
             is_auto_created = excluded.is_auto_created,
             group_name = excluded.group_name,
             icon_name = excluded.icon_name,
             manual = excluded.manual",
        t = store.tables().tool_registry
    );
    store.conn().execute(
        &sql,
        params![
            tool.tool_name,
            tool.persona,
            tool.description,
            tool.input_schema.to_string(),
            tool.active_hash_ref.as_str(),
            tool.is_auto_created,
            tool.group,
            tool.icon_name,
            tool.manual.as_ref().map(Value::to_string),
        ],
    )?;
    Ok(())
}

fn tool_from_row(row: &rusqlite::Row<'_>) -> Result<ToolRecord, rusqlite::Error> {
    let schema_text: String = row.get("input_schema")?;
    let manual_text: Option<String> = row.get("manual")?;
    Ok(ToolRecord {
        tool_name: row.get("tool_name")?,
        persona: row.get("persona")?,
        description: row.get("description")?,
        input_schema: serde_json::from_str(&schema_text).unwrap_or(Value::Null),
        active_hash_ref: ContentHash::from_hex(row.get::<_, String>("active_hash_ref")?),
        is_auto_created: row.get("is_auto_created")?,
        group: row.get("group_name")?,
        icon_name: row.get("icon_name")?,
        manual: manual_text.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

pub fn get_tool(store: &MetaStore, name: &str, persona: &str) -> EngineResult<Option<ToolRecord>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE tool_name = ?1 AND persona = ?2",
        t = store.tables().tool_registry
    );
    Ok(store
        .conn()
        .query_row(&sql, params![name, persona], tool_from_row)
        .optional()?)
}

/// First tool carrying this name under any persona, preferring `default`.
/// Used by inspection when the caller's own persona has no match.
pub fn find_tool_any_persona(store: &MetaStore, name: &str) -> EngineResult<Option<ToolRecord>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE tool_name = ?1
         ORDER BY CASE WHEN persona = 'default' THEN 0 ELSE 1 END, persona
         LIMIT 1",
        t = store.tables().tool_registry
    );
    Ok(store
        .conn()
        .query_row(&sql, params![name], tool_from_row)
        .optional()?)
}

pub fn list_tools(
    store: &MetaStore,
    persona: &str,
    group: Option<&str>,
) -> EngineResult<Vec<ToolRecord>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE persona = ?1
           AND (?2 IS NULL OR group_name = ?2)
         ORDER BY tool_name",
        t = store.tables().tool_registry
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![persona, group], tool_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn delete_tool(store: &MetaStore, name: &str, persona: &str) -> EngineResult<bool> {
    let sql = format!(
        "DELETE FROM {t} WHERE tool_name = ?1 AND persona = ?2",
        t = store.tables().tool_registry
    );
    Ok(store.conn().execute(&sql, params![name, persona])? > 0)
}

/// Replace a tool's manual in place.
pub fn update_tool_manual(
    store: &MetaStore,
    name: &str,
    persona: &str,
    manual: &Value,
) -> EngineResult<()> {
    let sql = format!(
        "UPDATE {t} SET manual = ?3 WHERE tool_name = ?1 AND persona = ?2",
        t = store.tables().tool_registry
    );
    let changed = store
        .conn()
        .execute(&sql, params![name, persona, manual.to_string()])?;
    if changed == 0 {
        return Err(EngineError::ToolNotFound {
            name: name.to_string(),
            persona: persona.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

pub fn upsert_resource(store: &MetaStore, resource: &ResourceRecord) -> EngineResult<()> {
    // Exactly one content source: static text or a vault reference.
    match (&resource.static_content, &resource.active_hash_ref) {
        (Some(_), None) if !resource.is_dynamic => {}
        (None, Some(_)) if resource.is_dynamic => {}
        _ => {
            return Err(EngineError::InvalidArguments(format!(
                "resource '{}' must have exactly one of static_content (static) or \
                 active_hash_ref (dynamic)",
                resource.uri
            )));
        }
    }

    let sql = format!(
        "INSERT INTO {t} (uri, name, description, mime_type, is_dynamic, static_content,
                          active_hash_ref, persona, group_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(uri) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             mime_type = excluded.mime_type,
             is_dynamic = excluded.is_dynamic,
             static_content = excluded.static_content,
             active_hash_ref = excluded.active_hash_ref,
             persona = excluded.persona,
             group_name = excluded.group_name",
        t = store.tables().resource_registry
    );
    store.conn().execute(
        &sql,
        params![
            resource.uri,
            resource.name,
            resource.description,
            resource.mime_type,
            resource.is_dynamic,
            resource.static_content,
            resource.active_hash_ref.as_ref().map(ContentHash::as_str),
            resource.persona,
            resource.group,
        ],
    )?;
    Ok(())
}

fn resource_from_row(row: &rusqlite::Row<'_>) -> Result<ResourceRecord, rusqlite::Error> {
    Ok(ResourceRecord {
        uri: row.get("uri")?,
        name: row.get("name")?,
        description: row.get("description")?,
        mime_type: row.get("mime_type")?,
        is_dynamic: row.get("is_dynamic")?,
        static_content: row.get("static_content")?,
        active_hash_ref: row
            .get::<_, Option<String>>("active_hash_ref")?
            .map(ContentHash::from_hex),
        persona: row.get("persona")?,
        group: row.get("group_name")?,
    })
}

pub fn get_resource(store: &MetaStore, uri: &str) -> EngineResult<Option<ResourceRecord>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE uri = ?1",
        t = store.tables().resource_registry
    );
    Ok(store
        .conn()
        .query_row(&sql, params![uri], resource_from_row)
        .optional()?)
}

pub fn list_resources(
    store: &MetaStore,
    persona: &str,
    group: Option<&str>,
) -> EngineResult<Vec<ResourceListing>> {
    let sql = format!(
        "SELECT uri, name, description, mime_type FROM {t}
         WHERE persona = ?1 AND (?2 IS NULL OR group_name = ?2)
         ORDER BY uri",
        t = store.tables().resource_registry
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![persona, group], |row| {
        Ok(ResourceListing {
            uri: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            mime_type: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn delete_resource(store: &MetaStore, uri: &str) -> EngineResult<bool> {
    let sql = format!(
        "DELETE FROM {t} WHERE uri = ?1",
        t = store.tables().resource_registry
    );
    Ok(store.conn().execute(&sql, params![uri])? > 0)
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub fn upsert_prompt(store: &MetaStore, prompt: &PromptRecord) -> EngineResult<()> {
    let sql = format!(
        "INSERT INTO {t} (name, description, template, arguments_schema, persona, group_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(name) DO UPDATE SET
             description = excluded.description,
             template = excluded.template,
             arguments_schema = excluded.arguments_schema,
             persona = excluded.persona,
             group_name = excluded.group_name",
        t = store.tables().prompt_registry
    );
    store.conn().execute(
        &sql,
        params![
            prompt.name,
            prompt.description,
            prompt.template,
            prompt.arguments_schema.to_string(),
            prompt.persona,
            prompt.group,
        ],
    )?;
    Ok(())
}

fn prompt_from_row(row: &rusqlite::Row<'_>) -> Result<PromptRecord, rusqlite::Error> {
    let schema_text: String = row.get("arguments_schema")?;
    Ok(PromptRecord {
        name: row.get("name")?,
        description: row.get("description")?,
        template: row.get("template")?,
        arguments_schema: serde_json::from_str(&schema_text).unwrap_or(Value::Null),
        persona: row.get("persona")?,
        group: row.get("group_name")?,
    })
}

pub fn get_prompt(store: &MetaStore, name: &str) -> EngineResult<Option<PromptRecord>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE name = ?1",
        t = store.tables().prompt_registry
    );
    Ok(store
        .conn()
        .query_row(&sql, params![name], prompt_from_row)
        .optional()?)
}

pub fn list_prompts(store: &MetaStore, persona: &str) -> EngineResult<Vec<PromptListing>> {
    let sql = format!(
        "SELECT * FROM {t} WHERE persona = ?1 ORDER BY name",
        t = store.tables().prompt_registry
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![persona], prompt_from_row)?;
    let prompts = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(prompts
        .into_iter()
        .map(|p| PromptListing {
            arguments: p
                .arguments_schema
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            name: p.name,
            description: p.description,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

pub fn upsert_macro(store: &MetaStore, record: &MacroRecord) -> EngineResult<()> {
    let sql = format!(
        "INSERT INTO {t} (name, description, template, is_active)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             description = excluded.description,
             template = excluded.template,
             is_active = excluded.is_active",
        t = store.tables().macro_registry
    );
    store.conn().execute(
        &sql,
        params![record.name, record.description, record.template, record.is_active],
    )?;
    Ok(())
}

pub fn list_macros(store: &MetaStore, active_only: bool) -> EngineResult<Vec<MacroRecord>> {
    let sql = format!(
        "SELECT name, description, template, is_active FROM {t}
         WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
        t = store.tables().macro_registry
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![active_only], |row| {
        Ok(MacroRecord {
            name: row.get(0)?,
            description: row.get(1)?,
            template: row.get(2)?,
            is_active: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Concatenated active-macro preamble for SQL expansion.
pub fn macro_preamble(store: &MetaStore) -> EngineResult<String> {
    let macros = list_macros(store, true)?;
    Ok(macros
        .iter()
        .map(|m| m.template.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

pub fn upsert_icon(store: &MetaStore, icon: &IconRecord) -> EngineResult<()> {
    let sql = format!(
        "INSERT INTO {t} (icon_name, mime_type, content)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(icon_name) DO UPDATE SET
             mime_type = excluded.mime_type,
             content = excluded.content",
        t = store.tables().icon_registry
    );
    store
        .conn()
        .execute(&sql, params![icon.icon_name, icon.mime_type, icon.content])?;
    Ok(())
}

pub fn get_icon(store: &MetaStore, name: &str) -> EngineResult<Option<IconRecord>> {
    let sql = format!(
        "SELECT icon_name, mime_type, content FROM {t} WHERE icon_name = ?1",
        t = store.tables().icon_registry
    );
    Ok(store
        .conn()
        .query_row(&sql, params![name], |row| {
            Ok(IconRecord {
                icon_name: row.get(0)?,
                mime_type: row.get(1)?,
                content: row.get(2)?,
            })
        })
        .optional()?)
}

pub fn list_icons(store: &MetaStore) -> EngineResult<Vec<IconRecord>> {
    let sql = format!(
        "SELECT icon_name, mime_type, content FROM {t} ORDER BY icon_name",
        t = store.tables().icon_registry
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(IconRecord {
            icon_name: row.get(0)?,
            mime_type: row.get(1)?,
            content: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Security policies
// ---------------------------------------------------------------------------

pub fn insert_policy(store: &MetaStore, policy: &PolicyRecord) -> EngineResult<i64> {
    let sql = format!(
        "INSERT INTO {t} (rule_type, category, pattern, description, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        t = store.tables().security_policy
    );
    let conn = store.conn();
    conn.execute(
        &sql,
        params![
            policy.rule_type,
            policy.category,
            policy.pattern,
            policy.description,
            policy.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn active_policies(store: &MetaStore) -> EngineResult<Vec<PolicyRecord>> {
    let sql = format!(
        "SELECT id, rule_type, category, pattern, description, is_active
         FROM {t} WHERE is_active = 1",
        t = store.tables().security_policy
    );
    let conn = store.conn();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(PolicyRecord {
            id: row.get(0)?,
            rule_type: row.get(1)?,
            category: row.get(2)?,
            pattern: row.get(3)?,
            description: row.get(4)?,
            is_active: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
