//! The dispatch and safety kernel.
//!
//! One `Engine` value owns both store handles, the temporary catalogue,
//! the plugin registry, and the macro-preamble cache; the server entry
//! point wraps it in an `Arc` and passes it to every operation.  The core
//! is synchronous: callers on an async runtime dispatch through
//! `spawn_blocking`.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rand::Rng as _;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::audit;
use crate::config::{Config, DatabaseConfig, TableNames};
use crate::error::{EngineError, EngineResult};
use crate::hash::ContentHash;
use crate::model::{
    CodeType, PromptListing, RenderedPrompt, ResourceListing, ToolListing, ToolRecord,
};
use crate::notebook;
use crate::plugins::{self, PluginRegistry};
use crate::registry;
use crate::store::{DataStore, MetaStore};
use crate::temp::TempCatalog;
use crate::template;
use crate::validator;
use crate::vault;

/// Everything needed to register a tool except its code.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub tool_name: String,
    pub persona: String,
    pub description: String,
    pub input_schema: Value,
    pub is_auto_created: bool,
    pub group: String,
    pub icon_name: Option<String>,
    pub manual: Option<Value>,
}

/// Per-call context handed to procedural tools.
///
/// Store handles are borrowed for the duration of the call and must not be
/// retained; the engine reference allows re-entrant execution (the chain
/// tool) under the same persona.
pub struct ToolContext<'a> {
    pub engine: &'a Engine,
    pub persona: String,
    pub tool_name: String,
}

impl ToolContext<'_> {
    pub fn meta(&self) -> &MetaStore {
        self.engine.meta()
    }

    pub fn data(&self) -> Option<Arc<DataStore>> {
        self.engine.data()
    }

    /// Re-enter the engine with the same persona (audited like any call).
    pub fn execute(&self, tool: &str, args: &Map<String, Value>) -> EngineResult<Value> {
        self.engine.execute(tool, &self.persona, args)
    }

    /// Route a tool-authored message to the server logs.
    pub fn log(&self, message: &str) {
        tracing::info!(tool = %self.tool_name, persona = %self.persona, "{message}");
    }
}

pub struct Engine {
    meta: MetaStore,
    data: ArcSwapOption<DataStore>,
    temp: TempCatalog,
    plugins: PluginRegistry,
    data_db: DatabaseConfig,
    tables: TableNames,
    self_correction: bool,
    notebook_audit: bool,
    macro_cache: Mutex<Option<String>>,
}

impl Engine {
    /// Open both stores per the configuration.  The metadata store is
    /// required; a failed data store leaves the engine in offline mode
    /// with a warning.
    pub fn from_config(config: &Config) -> EngineResult<Engine> {
        let meta = MetaStore::open(&config.metadata_database, &config.tables)?;
        let data = match DataStore::open(&config.data_database, &config.tables) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("data database connection failed: {e}");
                tracing::warn!(
                    "running in OFFLINE MODE - business data queries will be unavailable; \
                     use the 'reconnect_db' tool to reconnect at runtime"
                );
                None
            }
        };
        Ok(Engine::new(config, meta, data, PluginRegistry::builtin()))
    }

    pub fn new(
        config: &Config,
        meta: MetaStore,
        data: Option<DataStore>,
        plugins: PluginRegistry,
    ) -> Engine {
        Engine {
            meta,
            data: ArcSwapOption::from(data.map(Arc::new)),
            temp: TempCatalog::new(),
            plugins,
            data_db: config.data_database.clone(),
            tables: config.tables.clone(),
            self_correction: config.features.self_correction,
            notebook_audit: config.features.notebook_audit,
            macro_cache: Mutex::new(None),
        }
    }

    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    pub fn data(&self) -> Option<Arc<DataStore>> {
        self.data.load_full()
    }

    pub fn data_connected(&self) -> bool {
        self.data.load().is_some()
    }

    pub fn temp(&self) -> &TempCatalog {
        &self.temp
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn notebook_tracking(&self) -> bool {
        self.notebook_audit
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Execute a tool and audit the outcome.  Exactly one execution-log
    /// row is written per call, on the dedicated audit connection, whether
    /// the call succeeds or fails.
    pub fn execute(
        &self,
        tool_name: &str,
        persona: &str,
        args: &Map<String, Value>,
    ) -> EngineResult<Value> {
        match self.dispatch(tool_name, persona, args) {
            Ok(value) => {
                audit::log_success(&self.meta, tool_name, persona, args, &value);
                Ok(value)
            }
            Err(error) => {
                let detail = format!("{}: {error}", error.code());
                audit::log_failure(&self.meta, tool_name, persona, args, &detail);
                if self.self_correction
                    && let Err(e) = notebook::append_self_correction(&self.meta, tool_name, &detail)
                {
                    tracing::debug!("self-correction note for '{tool_name}' not recorded: {e}");
                }
                Err(error)
            }
        }
    }

    fn dispatch(
        &self,
        tool_name: &str,
        persona: &str,
        args: &Map<String, Value>,
    ) -> EngineResult<Value> {
        // Temporary tools shadow the persistent registry.
        if let Some(temp_tool) = self.temp.get_tool(tool_name, persona) {
            let blob = self.temp.get_blob(&temp_tool.code_hash).ok_or_else(|| {
                EngineError::ToolNotFound {
                    name: tool_name.to_string(),
                    persona: persona.to_string(),
                }
            })?;
            return match blob.code_type {
                CodeType::SqlSelect => self.run_sql(&blob.code_blob, args, Some(3)),
                CodeType::Procedural => {
                    self.run_procedural(&blob.code_blob, tool_name, persona, args)
                }
                CodeType::Dashboard => Err(dashboard_error(tool_name)),
            };
        }

        let tool = registry::get_tool(&self.meta, tool_name, persona)?.ok_or_else(|| {
            EngineError::ToolNotFound {
                name: tool_name.to_string(),
                persona: persona.to_string(),
            }
        })?;

        let entry = vault::get(&self.meta, &tool.active_hash_ref)?;
        entry.verify()?;

        match entry.code_type {
            CodeType::SqlSelect => {
                let limit = tool.is_auto_created.then_some(1000);
                self.run_sql(&entry.code_blob, args, limit)
            }
            CodeType::Procedural => self.run_procedural(&entry.code_blob, tool_name, persona, args),
            CodeType::Dashboard => Err(dashboard_error(tool_name)),
        }
    }

    fn run_sql(
        &self,
        template_text: &str,
        args: &Map<String, Value>,
        limit: Option<u32>,
    ) -> EngineResult<Value> {
        let data = self.data().ok_or(EngineError::Offline)?;

        let preamble = self.macro_preamble()?;
        let rendered = template::expand_sql(&preamble, template_text, args)?;
        validator::validate_sql(&rendered)?;

        let sql = match limit {
            Some(n) => validator::enforce_limit(&rendered, n),
            None => rendered,
        };

        let rows = data.query(&sql, args)?;
        Ok(Value::Array(rows))
    }

    fn run_procedural(
        &self,
        manifest: &str,
        tool_name: &str,
        persona: &str,
        args: &Map<String, Value>,
    ) -> EngineResult<Value> {
        let key = plugins::parse_manifest(manifest)?;
        let plugin = self
            .plugins
            .find(&key)
            .ok_or(EngineError::NoToolClass { key })?;

        let ctx = ToolContext {
            engine: self,
            persona: persona.to_string(),
            tool_name: tool_name.to_string(),
        };
        plugin.run(&ctx, args)
    }

    // -----------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------

    /// Register or update a tool: validate the code for its type, store
    /// the blob, and upsert the registry row.
    ///
    /// Validation happens here, at ingestion, because vault contents are
    /// trusted afterwards: procedural manifests must name a registered,
    /// policy-clean plugin; SQL templates must already pass the safety
    /// validator when rendered without arguments.
    pub fn install_tool(
        &self,
        spec: &ToolSpec,
        code: &str,
        code_type: CodeType,
    ) -> EngineResult<ContentHash> {
        match code_type {
            CodeType::Procedural => {
                let key = plugins::parse_manifest(code)?;
                crate::policy::check_plugin_key(&self.meta, &key)?;
                if !self.plugins.contains(&key) {
                    return Err(EngineError::NoToolClass { key });
                }
            }
            CodeType::SqlSelect => {
                // Render with the live macro preamble but no arguments:
                // optional-filter branches drop away and the bare statement
                // must already pass the validator.
                let preamble = self.macro_preamble()?;
                let rendered = template::expand_sql(&preamble, code, &Map::new())?;
                validator::validate_sql(&rendered)?;
            }
            CodeType::Dashboard => {}
        }

        let hash = vault::upsert(&self.meta, code, code_type)?;
        registry::upsert_tool(
            &self.meta,
            &ToolRecord {
                tool_name: spec.tool_name.clone(),
                persona: spec.persona.clone(),
                description: spec.description.clone(),
                input_schema: spec.input_schema.clone(),
                active_hash_ref: hash.clone(),
                is_auto_created: spec.is_auto_created,
                group: spec.group.clone(),
                icon_name: spec.icon_name.clone(),
                manual: spec.manual.clone(),
            },
        )?;
        Ok(hash)
    }

    // -----------------------------------------------------------------
    // Catalogue views
    // -----------------------------------------------------------------

    /// Persistent plus temporary tools visible to a persona, with the
    /// `[AUTO-BUILD]` / `[TEMP-TEST]` markers applied.
    pub fn list_tools(&self, persona: &str) -> EngineResult<Vec<ToolListing>> {
        let mut listings: Vec<ToolListing> = registry::list_tools(&self.meta, persona, None)?
            .into_iter()
            .map(|tool| ToolListing {
                name: tool.tool_name,
                description: if tool.is_auto_created {
                    format!("[AUTO-BUILD] {}", tool.description)
                } else {
                    tool.description
                },
                input_schema: tool.input_schema,
                icon_name: tool.icon_name,
            })
            .collect();

        for temp_tool in self.temp.tools_for_persona(persona) {
            listings.push(ToolListing {
                name: temp_tool.tool_name,
                description: format!("[TEMP-TEST] {}", temp_tool.description),
                input_schema: temp_tool.input_schema,
                icon_name: None,
            });
        }
        Ok(listings)
    }

    pub fn list_resources(&self, persona: &str) -> EngineResult<Vec<ResourceListing>> {
        let mut listings = registry::list_resources(&self.meta, persona, None)?;
        for temp in self.temp.resources_for_persona(persona) {
            listings.push(ResourceListing {
                uri: temp.uri,
                name: temp.name,
                description: format!("[TEMP-TEST] {}", temp.description),
                mime_type: temp.mime_type,
            });
        }
        Ok(listings)
    }

    pub fn list_prompts(&self, persona: &str) -> EngineResult<Vec<PromptListing>> {
        registry::list_prompts(&self.meta, persona)
    }

    /// Read a resource: temporary first, then static content or dynamic
    /// execution.  Returns `(content, mime_type)`.
    pub fn read_resource(&self, uri: &str, persona: &str) -> EngineResult<(String, String)> {
        if let Some(temp) = self.temp.get_resource(uri, persona) {
            return Ok((temp.content, temp.mime_type));
        }

        let resource = registry::get_resource(&self.meta, uri)?
            .ok_or_else(|| EngineError::ResourceNotFound { uri: uri.to_string() })?;

        if !resource.is_dynamic {
            let content = resource.static_content.unwrap_or_default();
            return Ok((content, resource.mime_type));
        }

        let hash = resource.active_hash_ref.ok_or_else(|| {
            EngineError::ResourceNotFound {
                uri: format!("{uri} (dynamic resource has no code reference)"),
            }
        })?;
        let entry = vault::get(&self.meta, &hash)?;
        entry.verify()?;

        // Dynamic resources receive their own identity as arguments.
        let mut args = Map::new();
        args.insert("uri".to_string(), Value::String(uri.to_string()));
        args.insert("persona".to_string(), Value::String(persona.to_string()));

        let content = match entry.code_type {
            CodeType::SqlSelect => {
                let rows = self.run_sql(&entry.code_blob, &args, None)?;
                serde_json::to_string_pretty(&rows)?
            }
            CodeType::Procedural => {
                let value =
                    self.run_procedural(&entry.code_blob, &resource.name, persona, &args)?;
                match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                }
            }
            CodeType::Dashboard => return Err(dashboard_error(&resource.name)),
        };
        Ok((content, resource.mime_type))
    }

    /// Render a prompt after checking its required arguments.
    pub fn render_prompt(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> EngineResult<RenderedPrompt> {
        let prompt = registry::get_prompt(&self.meta, name)?
            .ok_or_else(|| EngineError::PromptNotFound { name: name.to_string() })?;
        template::check_required_arguments(&prompt.arguments_schema, args)?;
        let text = template::render_prompt(&prompt.template, args)?;
        Ok(RenderedPrompt {
            description: prompt.description,
            text,
        })
    }

    /// Completion suggestions for one tool argument.  Degrades to an
    /// empty list when the tool is missing, SQL-typed, or has no handler.
    pub fn complete(&self, tool_name: &str, persona: &str, argument: &str, prefix: &str) -> Vec<String> {
        let manifest = (|| -> EngineResult<String> {
            let tool = registry::get_tool(&self.meta, tool_name, persona)?.ok_or_else(|| {
                EngineError::ToolNotFound {
                    name: tool_name.to_string(),
                    persona: persona.to_string(),
                }
            })?;
            let entry = vault::get(&self.meta, &tool.active_hash_ref)?;
            entry.verify()?;
            if entry.code_type != CodeType::Procedural {
                return Err(EngineError::InvalidArguments("not procedural".to_string()));
            }
            Ok(entry.code_blob)
        })();

        let Ok(manifest) = manifest else {
            return Vec::new();
        };
        let Ok(key) = plugins::parse_manifest(&manifest) else {
            return Vec::new();
        };
        let Some(plugin) = self.plugins.find(&key) else {
            return Vec::new();
        };

        let ctx = ToolContext {
            engine: self,
            persona: persona.to_string(),
            tool_name: tool_name.to_string(),
        };
        plugin.complete(&ctx, argument, prefix)
    }

    // -----------------------------------------------------------------
    // Macro preamble cache
    // -----------------------------------------------------------------

    /// Active-macro preamble, cached until a macro write invalidates it.
    pub fn macro_preamble(&self) -> EngineResult<String> {
        if let Some(cached) = self.macro_cache.lock().clone() {
            return Ok(cached);
        }
        let preamble = registry::macro_preamble(&self.meta)?;
        *self.macro_cache.lock() = Some(preamble.clone());
        Ok(preamble)
    }

    /// Must be called after any MacroRegistry write.
    pub fn invalidate_macro_cache(&self) {
        *self.macro_cache.lock() = None;
    }

    /// Upsert a macro through the engine so the cache stays coherent.
    pub fn install_macro(&self, record: &crate::model::MacroRecord) -> EngineResult<()> {
        registry::upsert_macro(&self.meta, record)?;
        self.invalidate_macro_cache();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Dual-store lifecycle
    // -----------------------------------------------------------------

    /// Swap in a fresh data store handle.
    pub fn swap_data(&self, store: DataStore) {
        self.data.store(Some(Arc::new(store)));
    }

    /// Re-attempt the data store with exponential backoff and swap the
    /// shared handle atomically on success.
    pub fn reconnect_data(&self) -> EngineResult<String> {
        self.reconnect_with(5, 1.0)
    }

    fn reconnect_with(&self, max_attempts: u32, base_delay: f64) -> EngineResult<String> {
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            tracing::info!(
                "connection attempt {attempt}/{max_attempts} to '{}'",
                self.data_db.url
            );
            match DataStore::open(&self.data_db, &self.tables) {
                Ok(store) => {
                    self.swap_data(store);
                    let message = format!(
                        "Successfully reconnected to business database at '{}' on attempt {attempt}",
                        self.data_db.url
                    );
                    tracing::info!("{message}");
                    return Ok(message);
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!("attempt {attempt} failed: {e}");
                    if attempt < max_attempts {
                        let jitter: f64 = rand::rng().random_range(-0.5..=0.5);
                        let delay = (base_delay * 2f64.powi(attempt as i32 - 1) + jitter).max(0.1);
                        std::thread::sleep(Duration::from_secs_f64(delay));
                    }
                }
            }
        }
        Err(EngineError::ToolRaised(format!(
            "failed to reconnect to business database after {max_attempts} attempts; last error: {last_error}"
        )))
    }

}

fn dashboard_error(name: &str) -> EngineError {
    EngineError::ToolRaised(format!(
        "'{name}' is a dashboard definition; it is rendered by the UI adapter, not executed here"
    ))
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_connected", &self.data_connected())
            .finish_non_exhaustive()
    }
}
