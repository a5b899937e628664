//! Server configuration.
//!
//! Loaded from `~/.chameleon/config/config.yaml` when present; every field
//! has a default so a missing or partial file is never an error.  CLI flags
//! override the loaded values, which override the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Transport for the RPC adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Sse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub logs_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "INFO".to_string(),
            logs_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            schema: None,
        }
    }
}

/// Per-entity table name overrides, defaulting to the canonical names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub code_vault: String,
    pub tool_registry: String,
    pub resource_registry: String,
    pub prompt_registry: String,
    pub macro_registry: String,
    pub security_policy: String,
    pub icon_registry: String,
    pub execution_log: String,
    pub agent_notebook: String,
    pub notebook_history: String,
    pub notebook_audit: String,
    pub sales_per_day: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            code_vault: "codevault".to_string(),
            tool_registry: "toolregistry".to_string(),
            resource_registry: "resourceregistry".to_string(),
            prompt_registry: "promptregistry".to_string(),
            macro_registry: "macroregistry".to_string(),
            security_policy: "securitypolicy".to_string(),
            icon_registry: "iconregistry".to_string(),
            execution_log: "executionlog".to_string(),
            agent_notebook: "agentnotebook".to_string(),
            notebook_history: "notebookhistory".to_string(),
            notebook_audit: "notebookaudit".to_string(),
            sales_per_day: "sales_per_day".to_string(),
        }
    }
}

impl TableNames {
    /// Apply an optional schema qualifier to every table name.
    pub fn qualified(&self, schema: Option<&str>) -> TableNames {
        let Some(schema) = schema else {
            return self.clone();
        };
        let q = |name: &str| format!("{schema}.{name}");
        TableNames {
            code_vault: q(&self.code_vault),
            tool_registry: q(&self.tool_registry),
            resource_registry: q(&self.resource_registry),
            prompt_registry: q(&self.prompt_registry),
            macro_registry: q(&self.macro_registry),
            security_policy: q(&self.security_policy),
            icon_registry: q(&self.icon_registry),
            execution_log: q(&self.execution_log),
            agent_notebook: q(&self.agent_notebook),
            notebook_history: q(&self.notebook_history),
            notebook_audit: q(&self.notebook_audit),
            sales_per_day: q(&self.sales_per_day),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub apps_dir: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            apps_dir: "ui_apps".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub chameleon_ui: UiConfig,
    /// When on, failed tool runs append a best-effort entry to the
    /// `self_correction` notebook domain.
    pub self_correction: bool,
    /// When on, notebook reads/writes/deletes append access-audit rows.
    pub notebook_audit: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            chameleon_ui: UiConfig::default(),
            self_correction: true,
            notebook_audit: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub metadata_database: DatabaseConfig,
    pub data_database: DatabaseConfig,
    pub tables: TableNames,
    pub features: FeaturesConfig,
}

impl Config {
    /// Default location: `~/.chameleon/config/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".chameleon").join("config").join("config.yaml"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable (a warning is logged, startup never
    /// fails on a bad config file).
    pub fn load() -> Config {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("error loading config file: {e}; using defaults");
                Config::default()
            }),
            _ => Config::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Config, String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut config: Config = serde_yaml::from_str(&text).map_err(|e| e.to_string())?;
        config.fill_database_defaults();
        Ok(config)
    }

    /// Database URL defaults are applied after deserialization so a config
    /// file overriding only one store keeps the default for the other.
    pub fn fill_database_defaults(&mut self) {
        if self.metadata_database.url.is_empty() {
            self.metadata_database.url = "sqlite://chameleon_meta.db".to_string();
        }
        if self.data_database.url.is_empty() {
            self.data_database.url = "sqlite://chameleon_data.db".to_string();
        }
    }
}
