//! Structured error type for the engine core.
//!
//! Every failure a tool call can produce maps to one variant with typed
//! context and a stable short code.  The RPC adapter renders these as text
//! bodies; the audit log records the code plus the full display message.

use thiserror::Error;

/// Which rule of the SQL safety validator rejected a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlViolation {
    MultiStatement,
    NotSelect,
    DangerousKeyword,
}

impl SqlViolation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlViolation::MultiStatement => "MULTI_STATEMENT",
            SqlViolation::NotSelect => "NOT_SELECT",
            SqlViolation::DangerousKeyword => "DANGEROUS_KEYWORD",
        }
    }
}

/// Structured error type for the engine core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    // --- Lookup failures ---
    #[error("tool '{name}' not found for persona '{persona}'")]
    ToolNotFound { name: String, persona: String },

    #[error("resource '{uri}' not found")]
    ResourceNotFound { uri: String },

    #[error("prompt '{name}' not found")]
    PromptNotFound { name: String },

    // --- Integrity ---
    #[error("integrity failure: {detail}")]
    Integrity { detail: String },

    // --- SQL safety ---
    #[error("sql validation failed ({}): {detail}", kind.as_str())]
    SqlValidation { kind: SqlViolation, detail: String },

    // --- Dual-store lifecycle ---
    #[error("business database is currently offline; use the 'reconnect_db' tool to try again")]
    Offline,

    // --- Chain engine ---
    #[error("chain validation failed at step '{step}': {detail}")]
    DagViolation { step: String, detail: String },

    // --- Procedural host ---
    #[error("no registered implementation for plugin '{key}'")]
    NoToolClass { key: String },

    #[error("security policy denies {category} '{pattern}'")]
    PolicyDenied { category: String, pattern: String },

    // --- Tool execution ---
    #[error("{0}")]
    ToolRaised(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // --- Infrastructure ---
    #[error("storage error: {0}")]
    Storage(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Stable short code used in logs and the audit trail.
    pub const fn code(&self) -> &'static str {
        match self {
            EngineError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            EngineError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            EngineError::PromptNotFound { .. } => "PROMPT_NOT_FOUND",
            EngineError::Integrity { .. } => "INTEGRITY",
            EngineError::SqlValidation { .. } => "SQL_VALIDATION",
            EngineError::Offline => "OFFLINE",
            EngineError::DagViolation { .. } => "DAG_VIOLATION",
            EngineError::NoToolClass { .. } => "NO_TOOL_CLASS",
            EngineError::PolicyDenied { .. } => "POLICY_DENIED",
            EngineError::ToolRaised(_) => "TOOL_RAISED",
            EngineError::InvalidArguments(_) => "BAD_ARGUMENTS",
            EngineError::Storage(_) => "STORAGE",
            EngineError::Template(_) => "TEMPLATE",
            EngineError::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Whether the adapter should render this as a security error.
    pub const fn is_security(&self) -> bool {
        matches!(
            self,
            EngineError::Integrity { .. }
                | EngineError::SqlValidation { .. }
                | EngineError::PolicyDenied { .. }
        )
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<minijinja::Error> for EngineError {
    fn from(e: minijinja::Error) -> Self {
        EngineError::Template(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
