//! In-process temporary tools and resources.
//!
//! Mirrors of the persistent schemas, keyed `name:persona` / `uri:persona`,
//! held behind mutexes and never written to either database.  They exist
//! for experimentation and vanish on restart.  SQL-typed temporary tools
//! are capped at `LIMIT 3` by the engine.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use crate::hash::ContentHash;
use crate::model::CodeType;

#[derive(Debug, Clone)]
pub struct TempTool {
    pub tool_name: String,
    pub persona: String,
    pub description: String,
    pub input_schema: Value,
    pub code_hash: ContentHash,
}

#[derive(Debug, Clone)]
pub struct TempResource {
    pub uri: String,
    pub persona: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct TempBlob {
    pub code_blob: String,
    pub code_type: CodeType,
}

/// Process-wide temporary catalogue.  Contention is low (admin-initiated
/// creation is rare), so plain mutexes are enough.
#[derive(Default)]
pub struct TempCatalog {
    tools: Mutex<HashMap<String, TempTool>>,
    resources: Mutex<HashMap<String, TempResource>>,
    vault: Mutex<HashMap<String, TempBlob>>,
}

fn tool_key(name: &str, persona: &str) -> String {
    format!("{name}:{persona}")
}

impl TempCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tool(&self, tool: TempTool, code: &str, code_type: CodeType) {
        self.vault.lock().insert(
            tool.code_hash.as_str().to_string(),
            TempBlob {
                code_blob: code.to_string(),
                code_type,
            },
        );
        self.tools
            .lock()
            .insert(tool_key(&tool.tool_name, &tool.persona), tool);
    }

    pub fn get_tool(&self, name: &str, persona: &str) -> Option<TempTool> {
        self.tools.lock().get(&tool_key(name, persona)).cloned()
    }

    pub fn remove_tool(&self, name: &str, persona: &str) -> bool {
        self.tools.lock().remove(&tool_key(name, persona)).is_some()
    }

    pub fn tools_for_persona(&self, persona: &str) -> Vec<TempTool> {
        let mut tools: Vec<TempTool> = self
            .tools
            .lock()
            .values()
            .filter(|t| t.persona == persona)
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        tools
    }

    pub fn get_blob(&self, hash: &ContentHash) -> Option<TempBlob> {
        self.vault.lock().get(hash.as_str()).cloned()
    }

    pub fn insert_resource(&self, resource: TempResource) {
        self.resources
            .lock()
            .insert(tool_key(&resource.uri, &resource.persona), resource);
    }

    pub fn get_resource(&self, uri: &str, persona: &str) -> Option<TempResource> {
        self.resources.lock().get(&tool_key(uri, persona)).cloned()
    }

    pub fn resources_for_persona(&self, persona: &str) -> Vec<TempResource> {
        let mut resources: Vec<TempResource> = self
            .resources
            .lock()
            .values()
            .filter(|r| r.persona == persona)
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }
}
