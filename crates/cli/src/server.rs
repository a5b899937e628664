//! MCP adapter over the engine.
//!
//! All handlers are dynamic: the catalogue comes from the metadata store
//! per request persona, and tool calls dispatch through the engine on a
//! blocking task.  Engine errors are rendered as text bodies; exceptions
//! never escape the call boundary unconverted.

use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;

use chameleon::model::IconRecord;
use chameleon::{Engine, EngineError, registry, toon};

/// Reserved call argument choosing the response encoding; consumed by the
/// adapter, never passed to the tool.
const FORMAT_KEY: &str = "_format";

/// Built-in resource listing every stored icon.
const ICONS_LIST_URI: &str = "icons://list";

#[derive(Clone)]
pub struct ChameleonServer {
    engine: Arc<Engine>,
}

impl ChameleonServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Engine>) -> T + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(engine))
            .await
            .map_err(|e| McpError::internal_error(format!("worker task failed: {e}"), None))
    }
}

/// Persona from request metadata, falling back to the context metadata and
/// then to `default`.
fn resolve_persona(request_meta: Option<&Meta>, context_meta: &Meta) -> String {
    let from = |meta: &Meta| {
        meta.get("persona")
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    request_meta
        .and_then(from)
        .or_else(|| from(context_meta))
        .unwrap_or_else(|| "default".to_string())
}

/// Response encoding selected by `_format`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Toon,
    Text,
}

impl OutputFormat {
    fn parse(value: Option<&Value>) -> OutputFormat {
        match value.and_then(Value::as_str).map(str::to_ascii_lowercase) {
            None => OutputFormat::Json,
            Some(f) if f == "json" => OutputFormat::Json,
            Some(f) if f == "toon" => OutputFormat::Toon,
            // Unknown formats degrade to plain text.
            Some(_) => OutputFormat::Text,
        }
    }

    fn render(self, value: &Value) -> String {
        match self {
            OutputFormat::Json => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            OutputFormat::Toon => toon::encode(value),
            OutputFormat::Text => match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// Render an engine failure as the user-visible error body.
fn error_body(error: &EngineError) -> String {
    if error.is_security() {
        format!("Security Error: {error}")
    } else {
        format!("Error: {error}")
    }
}

/// Build a data URI for a stored icon, tolerating raw SVG, bare base64,
/// and already-complete data URIs.
fn icon_to_data_uri(icon: &IconRecord) -> String {
    use base64::Engine as _;
    let content = icon.content.trim();
    if content.starts_with("data:") {
        return content.to_string();
    }
    if content.starts_with('<') {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        return format!("data:{};base64,{encoded}", icon.mime_type);
    }
    format!("data:{};base64,{content}", icon.mime_type)
}

fn schema_object(schema: &Value) -> Arc<JsonObject> {
    match schema {
        Value::Object(map) => Arc::new(map.clone()),
        _ => Arc::new(JsonObject::new()),
    }
}

impl ServerHandler for ChameleonServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .enable_completions()
                .build(),
            server_info: Implementation {
                name: "chameleon-engine".to_string(),
                title: Some("Chameleon Engine".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "chameleon-engine serves tools, resources, and prompts stored in its metadata \
                 database.\n\n\
                 - Pass `_format` (json | toon | text) with any tool call to choose the response \
                 encoding.\n\
                 - Tools marked [AUTO-BUILD] were registered at runtime and cap results at 1000 \
                 rows; [TEMP-TEST] tools live only in this process and cap at 3 rows.\n\
                 - If business-data tools report the database as offline, call `reconnect_db`.\n\
                 - `system_run_chain` executes multi-step workflows with ${id} substitution.\n\
                 - `system_inspect_tool` returns a tool's manual and schema before you call it; \
                 `read_resource` fetches any resource through the tool surface if your client \
                 does not support Resources."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        tracing::info!("listing tools for persona '{persona}'");

        let (listings, icons) = self
            .run_blocking(move |engine| {
                let listings = engine.list_tools(&persona);
                let icons = registry::list_icons(engine.meta()).unwrap_or_default();
                (listings, icons)
            })
            .await?;
        let listings = listings.map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let find_icon = |name: Option<&str>| -> Option<Vec<Icon>> {
            let wanted = name.unwrap_or("default_chameleon");
            icons.iter().find(|i| i.icon_name == wanted).map(|icon| {
                vec![Icon {
                    src: icon_to_data_uri(icon),
                    mime_type: Some(icon.mime_type.clone()),
                    sizes: None,
                }]
            })
        };

        let tools = listings
            .into_iter()
            .map(|listing| Tool {
                name: Cow::Owned(listing.name),
                title: None,
                description: Some(Cow::Owned(listing.description)),
                input_schema: schema_object(&listing.input_schema),
                output_schema: None,
                annotations: None,
                icons: find_icon(listing.icon_name.as_deref()),
                meta: None,
            })
            .collect::<Vec<_>>();

        tracing::info!("returning {} tool(s)", tools.len());
        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let persona = resolve_persona(request.meta.as_ref(), &context.meta);
        let name = request.name.to_string();

        let mut args: Map<String, Value> = request.arguments.unwrap_or_default();
        let format = OutputFormat::parse(args.remove(FORMAT_KEY).as_ref());

        tracing::info!("calling tool '{name}' for persona '{persona}'");

        let tool = name.clone();
        let outcome = self
            .run_blocking(move |engine| engine.execute(&tool, &persona, &args))
            .await?;

        match outcome {
            Ok(value) => {
                tracing::info!("tool '{name}' executed successfully");
                Ok(CallToolResult::success(vec![Content::text(
                    format.render(&value),
                )]))
            }
            Err(error) => {
                match &error {
                    EngineError::SqlValidation { .. } => {
                        tracing::warn!("validation rejected tool '{name}': {error}")
                    }
                    _ => tracing::error!("error executing tool '{name}': {error}"),
                }
                Ok(CallToolResult::error(vec![Content::text(error_body(
                    &error,
                ))]))
            }
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        let listings = self
            .run_blocking(move |engine| engine.list_resources(&persona))
            .await?
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let resources = listings
            .into_iter()
            .map(|listing| {
                let mut raw = RawResource::new(listing.uri, listing.name);
                raw.description = Some(listing.description);
                raw.mime_type = Some(listing.mime_type);
                Resource {
                    raw,
                    annotations: None,
                }
            })
            .collect();

        Ok(ListResourcesResult {
            resources,
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        let uri = request.uri.to_string();
        tracing::info!("reading resource '{uri}' for persona '{persona}'");

        if uri == ICONS_LIST_URI {
            let icons = self
                .run_blocking(|engine| registry::list_icons(engine.meta()))
                .await?
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            let listing: Vec<Value> = icons
                .iter()
                .map(|icon| {
                    serde_json::json!({
                        "name": icon.icon_name,
                        "mime_type": icon.mime_type,
                        "preview": format!("(content length: {})", icon.content.len()),
                    })
                })
                .collect();
            let text = serde_json::to_string_pretty(&listing)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            return Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(text, uri)],
            });
        }

        let target = uri.clone();
        let outcome = self
            .run_blocking(move |engine| engine.read_resource(&target, &persona))
            .await?;

        match outcome {
            Ok((content, _mime_type)) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri)],
            }),
            Err(error) => {
                tracing::error!("error reading resource '{uri}': {error}");
                Err(McpError::resource_not_found(error_body(&error), None))
            }
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        let listings = self
            .run_blocking(move |engine| engine.list_prompts(&persona))
            .await?
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let prompts = listings
            .into_iter()
            .map(|listing| {
                let arguments: Vec<PromptArgument> = listing
                    .arguments
                    .as_array()
                    .map(|args| {
                        args.iter()
                            .map(|arg| PromptArgument {
                                name: arg
                                    .get("name")
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string(),
                                title: None,
                                description: arg
                                    .get("description")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                                required: arg.get("required").and_then(Value::as_bool),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Prompt::new(
                    listing.name,
                    Some(listing.description),
                    if arguments.is_empty() {
                        None
                    } else {
                        Some(arguments)
                    },
                )
            })
            .collect();

        Ok(ListPromptsResult {
            prompts,
            ..Default::default()
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        let name = request.name.to_string();
        let args: Map<String, Value> = request
            .arguments
            .map(|map| map.into_iter().collect())
            .unwrap_or_default();
        let _ = persona; // prompts are keyed by name; persona scopes only listings

        let target = name.clone();
        let outcome = self
            .run_blocking(move |engine| engine.render_prompt(&target, &args))
            .await?;

        match outcome {
            Ok(rendered) => Ok(GetPromptResult {
                description: Some(rendered.description),
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    rendered.text,
                )],
            }),
            Err(error) => {
                tracing::error!("error getting prompt '{name}': {error}");
                Err(McpError::invalid_params(error_body(&error), None))
            }
        }
    }

    async fn complete(
        &self,
        request: CompleteRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CompleteResult, McpError> {
        let persona = resolve_persona(None, &context.meta);
        let target = match &request.r#ref {
            Reference::Prompt(prompt) => prompt.name.clone(),
            Reference::Resource(resource) => resource.uri.clone(),
        };
        let argument = request.argument.name.clone();
        let prefix = request.argument.value.clone();

        let values = self
            .run_blocking(move |engine| engine.complete(&target, &persona, &argument, &prefix))
            .await?;

        Ok(CompleteResult {
            completion: CompletionInfo {
                total: Some(values.len() as u32),
                values,
                has_more: Some(false),
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn persona_prefers_request_meta() {
        let mut request_meta = Meta::new();
        request_meta.insert("persona".to_string(), json!("analyst"));
        let mut context_meta = Meta::new();
        context_meta.insert("persona".to_string(), json!("viewer"));

        assert_eq!(
            resolve_persona(Some(&request_meta), &context_meta),
            "analyst"
        );
        assert_eq!(resolve_persona(None, &context_meta), "viewer");
        assert_eq!(resolve_persona(None, &Meta::new()), "default");
    }

    #[test]
    fn format_parsing_defaults_and_degrades() {
        assert!(matches!(OutputFormat::parse(None), OutputFormat::Json));
        assert!(matches!(
            OutputFormat::parse(Some(&json!("TOON"))),
            OutputFormat::Toon
        ));
        assert!(matches!(
            OutputFormat::parse(Some(&json!("yaml"))),
            OutputFormat::Text
        ));
    }

    #[test]
    fn format_rendering() {
        let rows = json!([{"a": 1}, {"a": 2}]);
        assert!(OutputFormat::Json.render(&rows).contains("\"a\": 1"));
        assert_eq!(OutputFormat::Toon.render(&rows), "[2]{a}:\n  1\n  2");
        assert_eq!(OutputFormat::Text.render(&json!("plain")), "plain");
    }

    #[test]
    fn icon_data_uri_variants() {
        let svg = IconRecord {
            icon_name: "i".to_string(),
            mime_type: "image/svg+xml".to_string(),
            content: "<svg/>".to_string(),
        };
        assert!(icon_to_data_uri(&svg).starts_with("data:image/svg+xml;base64,"));

        let passthrough = IconRecord {
            content: "data:image/png;base64,AAAA".to_string(),
            mime_type: "image/png".to_string(),
            icon_name: "p".to_string(),
        };
        assert_eq!(icon_to_data_uri(&passthrough), "data:image/png;base64,AAAA");

        let bare = IconRecord {
            content: "AAAA".to_string(),
            mime_type: "image/png".to_string(),
            icon_name: "b".to_string(),
        };
        assert_eq!(icon_to_data_uri(&bare), "data:image/png;base64,AAAA");
    }

    #[test]
    fn security_errors_get_their_own_prefix() {
        let err = EngineError::Integrity {
            detail: "hash mismatch".to_string(),
        };
        assert!(error_body(&err).starts_with("Security Error:"));
        assert!(error_body(&EngineError::Offline).starts_with("Error:"));
    }
}
