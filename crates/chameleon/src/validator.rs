//! SQL safety validator.
//!
//! Treats the rendered SQL as opaque text and applies a coarse filter:
//! comment scrubbing, the single-statement rule, the read-only rule, and a
//! quote-aware keyword denylist.  True authorization belongs to the
//! database user the data store connects as.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{EngineError, EngineResult, SqlViolation};

/// Verbs that must not appear anywhere in scrubbed, unquoted text.
const DENIED_KEYWORDS: &[&str] = &[
    "UPDATE", "INSERT", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "MERGE", "ATTACH", "DETACH", "PRAGMA",
];

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--[^\n]*").unwrap());
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static DENYLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", DENIED_KEYWORDS.join("|"))).unwrap()
});
static TRAILING_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+LIMIT\s+\d+\s*$").unwrap());

/// Strip single-line (`-- …`) and block (`/* … */`, non-greedy) comments.
/// All subsequent checks run on the scrubbed text.
pub fn scrub_comments(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, " ");
    LINE_COMMENT.replace_all(&without_blocks, " ").into_owned()
}

/// Blank out the contents of quoted string literals so keyword matching
/// never fires inside data.  Doubled quotes inside a literal stay part of
/// the same literal.
fn mask_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match in_quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    chars.next();
                    out.push(' ');
                    out.push(' ');
                } else {
                    in_quote = None;
                    out.push(c);
                }
            }
            Some(_) => out.push(' '),
            None => {
                if c == '\'' || c == '"' {
                    in_quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Validate a rendered SQL statement against all safety rules, in order.
pub fn validate_sql(sql: &str) -> EngineResult<()> {
    let scrubbed = scrub_comments(sql);

    // Single-statement rule: one trailing semicolon is tolerated, any
    // other semicolon rejects.
    let masked = mask_string_literals(&scrubbed);
    let trimmed = masked.trim_end();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(EngineError::SqlValidation {
            kind: SqlViolation::MultiStatement,
            detail: "multiple SQL statements are not allowed".to_string(),
        });
    }

    // Read-only rule: the first token must be SELECT, or WITH for CTEs.
    let first = scrubbed
        .split_whitespace()
        .next()
        .map(str::to_ascii_uppercase)
        .unwrap_or_default();
    if first != "SELECT" && first != "WITH" {
        return Err(EngineError::SqlValidation {
            kind: SqlViolation::NotSelect,
            detail: format!("only SELECT statements are allowed, found '{first}'"),
        });
    }

    // Keyword denylist outside quoted literals.
    if let Some(found) = DENYLIST.find(&masked) {
        return Err(EngineError::SqlValidation {
            kind: SqlViolation::DangerousKeyword,
            detail: format!("forbidden keyword '{}'", found.as_str().to_ascii_uppercase()),
        });
    }

    Ok(())
}

/// Replace any trailing `LIMIT n` with an enforced limit.
///
/// Used to cap temporary tools at 3 rows and auto-created tools at 1000.
pub fn enforce_limit(sql: &str, limit: u32) -> String {
    let trimmed = sql.trim_end().trim_end_matches(';').trim_end();
    let without_limit = TRAILING_LIMIT.replace(trimmed, "");
    format!("{} LIMIT {limit}", without_limit.trim_end())
}
