//! Security policy evaluation for the procedural host.
//!
//! The metadata store is trusted once validated, so policies are checked
//! at ingestion (tool upsert) rather than on every dispatch.  Active deny
//! rows extend the static deny list below; deny always wins over allow.

use crate::error::{EngineError, EngineResult};
use crate::model::PolicyRecord;
use crate::registry;
use crate::store::MetaStore;

/// Plugin keys no manifest may ever name, regardless of database state.
const STATIC_DENY: &[(&str, &str)] = &[
    ("module", "std::process"),
    ("module", "std::fs"),
    ("function", "eval"),
    ("function", "exec"),
];

fn matches(pattern: &str, name: &str) -> bool {
    // Patterns match the whole name or a leading path segment, so a rule
    // for `std::process` also covers `std::process::Command`.
    name == pattern || name.starts_with(&format!("{pattern}::")) || {
        match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => false,
        }
    }
}

/// Reject `name` (of the given category) when any static or active deny
/// rule matches.  Allow rows cannot override a deny.
pub fn check_denied(store: &MetaStore, category: &str, name: &str) -> EngineResult<()> {
    for (deny_category, pattern) in STATIC_DENY {
        if *deny_category == category && matches(pattern, name) {
            return Err(EngineError::PolicyDenied {
                category: category.to_string(),
                pattern: (*pattern).to_string(),
            });
        }
    }

    let policies = registry::active_policies(store)?;
    let denied = policies
        .iter()
        .filter(|p| p.rule_type == "deny" && p.category == category)
        .find(|p| matches(&p.pattern, name));
    if let Some(policy) = denied {
        return Err(EngineError::PolicyDenied {
            category: category.to_string(),
            pattern: policy.pattern.clone(),
        });
    }
    Ok(())
}

/// Convenience used by tool ingestion: validate a plugin key against the
/// `function` category.
pub fn check_plugin_key(store: &MetaStore, key: &str) -> EngineResult<()> {
    check_denied(store, "function", key)
}

/// Install a policy row (used by seeding and admin paths).
pub fn add_policy(store: &MetaStore, policy: &PolicyRecord) -> EngineResult<i64> {
    registry::insert_policy(store, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, TableNames};

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

    #[test]
    fn static_deny_applies_without_db_rows() {
        let store = memory_store();
        assert!(check_denied(&store, "function", "exec").is_err());
        assert!(check_denied(&store, "module", "std::process::Command").is_err());
        assert!(check_denied(&store, "function", "utility_greet").is_ok());
    }

    #[test]
    fn active_deny_row_extends_the_list() {
        let store = memory_store();
        add_policy(
            &store,
            &PolicyRecord {
                id: None,
                rule_type: "deny".to_string(),
                category: "function".to_string(),
                pattern: "dangerous_*".to_string(),
                description: None,
                is_active: true,
            },
        )
        .unwrap();

        let err = check_plugin_key(&store, "dangerous_probe").unwrap_err();
        assert_eq!(err.code(), "POLICY_DENIED");
        assert!(check_plugin_key(&store, "safe_probe").is_ok());
    }

    #[test]
    fn inactive_rows_are_ignored() {
        let store = memory_store();
        add_policy(
            &store,
            &PolicyRecord {
                id: None,
                rule_type: "deny".to_string(),
                category: "function".to_string(),
                pattern: "probe".to_string(),
                description: None,
                is_active: false,
            },
        )
        .unwrap();
        assert!(check_plugin_key(&store, "probe").is_ok());
    }

    #[test]
    fn allow_rows_never_override_deny() {
        let store = memory_store();
        add_policy(
            &store,
            &PolicyRecord {
                id: None,
                rule_type: "allow".to_string(),
                category: "function".to_string(),
                pattern: "exec".to_string(),
                description: None,
                is_active: true,
            },
        )
        .unwrap();
        // exec stays statically denied.
        assert!(check_plugin_key(&store, "exec").is_err());
    }
}
