//! Entity records for the metadata and data stores.
//!
//! These mirror the persisted schema one-to-one; the registry module maps
//! rows into them and back.  Schemas and manuals are carried as raw JSON
//! values since their shape is authoritative for the RPC surface, not for
//! the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::ContentHash;

/// How a vault blob is dispatched by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeType {
    /// A manifest naming a registered procedural plugin.
    Procedural,
    /// A SQL SELECT template rendered and run against the data store.
    SqlSelect,
    /// A dashboard definition consumed by the UI adapter, never executed here.
    Dashboard,
}

impl CodeType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CodeType::Procedural => "procedural",
            CodeType::SqlSelect => "sql-select",
            CodeType::Dashboard => "dashboard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "procedural" => Some(CodeType::Procedural),
            "sql-select" => Some(CodeType::SqlSelect),
            "dashboard" => Some(CodeType::Dashboard),
            _ => None,
        }
    }
}

/// A registered tool, keyed by `(tool_name, persona)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_name: String,
    pub persona: String,
    pub description: String,
    /// JSON Schema for the tool arguments; authoritative for `list_tools`.
    pub input_schema: Value,
    pub active_hash_ref: ContentHash,
    /// True when registered by a meta-tool rather than by seeding.
    pub is_auto_created: bool,
    pub group: String,
    pub icon_name: Option<String>,
    /// Optional structured manual: usage_guide, examples (each with a
    /// `verified` flag), pitfalls, error_codes.
    pub manual: Option<Value>,
}

/// A registered resource, keyed by URI.  Exactly one of `static_content`
/// and `active_hash_ref` is populated; enforced at upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub is_dynamic: bool,
    pub static_content: Option<String>,
    pub active_hash_ref: Option<ContentHash>,
    pub persona: String,
    pub group: String,
}

/// A registered prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub name: String,
    pub description: String,
    pub template: String,
    /// `{ "arguments": [ { name, description, required } ] }`
    pub arguments_schema: Value,
    pub persona: String,
    pub group: String,
}

/// A reusable template macro.  Active macros are concatenated and
/// prepended to every SQL template before expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRecord {
    pub name: String,
    pub description: String,
    pub template: String,
    pub is_active: bool,
}

/// One allow/deny rule extending the procedural host's static deny list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: Option<i64>,
    /// "allow" or "deny"; deny always wins.
    pub rule_type: String,
    /// "module", "function", or "attribute".
    pub category: String,
    pub pattern: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A stored tool icon (raw SVG or base64 content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconRecord {
    pub icon_name: String,
    pub mime_type: String,
    pub content: String,
}

/// Outcome recorded for one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatus {
    Success,
    Failure,
}

impl ExecStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Success => "SUCCESS",
            ExecStatus::Failure => "FAILURE",
        }
    }
}

/// One row of the append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    /// RFC 3339 UTC with microsecond granularity.
    pub timestamp: String,
    pub tool_name: String,
    pub persona: String,
    pub arguments: Value,
    pub status: String,
    pub result_summary: String,
    pub error_detail: Option<String>,
}

/// A long-term memory entry, keyed by `(domain, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub domain: String,
    pub key: String,
    pub value: String,
    pub created_at: String,
    pub updated_at: String,
    pub updated_by: String,
    pub is_active: bool,
}

/// One recorded change to a notebook entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookChange {
    pub id: i64,
    pub domain: String,
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub changed_at: String,
    pub changed_by: String,
}

/// Denormalised tool view consumed by the RPC adapter (no code blobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListing {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub icon_name: Option<String>,
}

/// Denormalised resource view for `list_resources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceListing {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Denormalised prompt view for `list_prompts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptListing {
    pub name: String,
    pub description: String,
    /// `[ { name, description, required } ]`
    pub arguments: Value,
}

/// A rendered prompt ready for the adapter to wrap into protocol messages.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub description: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_type_round_trip() {
        for ct in [CodeType::Procedural, CodeType::SqlSelect, CodeType::Dashboard] {
            assert_eq!(CodeType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(CodeType::parse("python"), None);
    }

    #[test]
    fn exec_status_wire_strings() {
        assert_eq!(ExecStatus::Success.as_str(), "SUCCESS");
        assert_eq!(ExecStatus::Failure.as_str(), "FAILURE");
    }
}
