//! Procedural tool host.
//!
//! Procedural tools are first-class implementations registered at startup;
//! a procedural vault blob is a small hash-verified manifest naming the
//! plugin key to dispatch to.  Manifests are validated at ingestion (key
//! resolves, security policy passes), not re-parsed on every call.

use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::ToolContext;
use crate::error::{EngineError, EngineResult};

mod chain_tool;
mod debug;
mod echo;
mod greet;
mod inspect;
mod macro_creator;
mod math;
mod notebook_tool;
mod prompt_creator;
mod reconnect;
mod resource_bridge;
mod resource_creator;
mod sql_creator;
mod temp_creator;
mod verifier;

pub use chain_tool::ChainTool;
pub use debug::LastErrorTool;
pub use echo::EchoTool;
pub use greet::GreetTool;
pub use inspect::InspectTool;
pub use macro_creator::MacroCreatorTool;
pub use math::{AddTool, UppercaseTool};
pub use notebook_tool::NotebookTool;
pub use prompt_creator::PromptCreatorTool;
pub use reconnect::ReconnectTool;
pub use resource_bridge::ReadResourceTool;
pub use resource_creator::ResourceCreatorTool;
pub use sql_creator::SqlCreatorTool;
pub use temp_creator::{TempResourceCreatorTool, TempToolCreatorTool};
pub use verifier::VerifyExamplesTool;

/// A registered procedural tool implementation.
///
/// `run` receives the call context (persona, tool name, store handles, and
/// the engine for re-entrant execution) and the argument map.  Tools that
/// mutate the metadata store commit their own writes; the engine only
/// audits.  `complete` backs the RPC completion handler and is optional.
pub trait ProceduralTool: Send + Sync {
    fn key(&self) -> &'static str;

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value>;

    fn complete(&self, _ctx: &ToolContext<'_>, _argument: &str, _prefix: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Plugin constructors registered at startup, keyed by plugin key.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<&'static str, Arc<dyn ProceduralTool>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in tool.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GreetTool));
        registry.register(Arc::new(AddTool));
        registry.register(Arc::new(UppercaseTool));
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(LastErrorTool));
        registry.register(Arc::new(ChainTool));
        registry.register(Arc::new(ReconnectTool));
        registry.register(Arc::new(NotebookTool));
        registry.register(Arc::new(SqlCreatorTool));
        registry.register(Arc::new(MacroCreatorTool));
        registry.register(Arc::new(PromptCreatorTool));
        registry.register(Arc::new(ResourceCreatorTool));
        registry.register(Arc::new(TempToolCreatorTool));
        registry.register(Arc::new(TempResourceCreatorTool));
        registry.register(Arc::new(VerifyExamplesTool));
        registry.register(Arc::new(InspectTool));
        registry.register(Arc::new(ReadResourceTool));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn ProceduralTool>) -> &mut Self {
        self.plugins.insert(plugin.key(), plugin);
        self
    }

    pub fn find(&self, key: &str) -> Option<Arc<dyn ProceduralTool>> {
        self.plugins.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.plugins.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.plugins.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

/// Build the vault blob for a procedural tool.
pub fn manifest_for(key: &str) -> String {
    json!({ "plugin": key }).to_string()
}

/// Extract the plugin key from a procedural vault blob.  Accepts the JSON
/// manifest form and, for hand-registered blobs, a bare key.
pub fn parse_manifest(blob: &str) -> EngineResult<String> {
    let trimmed = blob.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && let Some(key) = value.get("plugin").and_then(Value::as_str)
    {
        return Ok(key.to_string());
    }
    if !trimmed.is_empty() && !trimmed.contains(['{', '\n', ' ']) {
        return Ok(trimmed.to_string());
    }
    Err(EngineError::Integrity {
        detail: "procedural blob is not a recognizable plugin manifest".to_string(),
    })
}

/// Pull a required string argument.
pub(crate) fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> EngineResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::InvalidArguments(format!("'{name}' is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips() {
        let blob = manifest_for("utility_greet");
        assert_eq!(parse_manifest(&blob).unwrap(), "utility_greet");
    }

    #[test]
    fn bare_key_manifest_parses() {
        assert_eq!(parse_manifest("echo\n").unwrap(), "echo");
    }

    #[test]
    fn garbage_manifest_is_rejected() {
        assert!(parse_manifest("class Foo:\n  pass").is_err());
        assert!(parse_manifest("{}").is_err());
    }

    #[test]
    fn builtin_registry_has_system_tools() {
        let registry = PluginRegistry::builtin();
        for key in [
            "utility_greet",
            "system_run_chain",
            "reconnect_db",
            "system_notebook",
            "system_create_sql_tool",
            "system_inspect_tool",
            "create_new_prompt",
            "create_new_resource",
            "read_resource",
        ] {
            assert!(registry.contains(key), "missing builtin '{key}'");
        }
    }
}
