//! Runtime reconnection to the data store.

use serde_json::{Map, Value};

use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::plugins::ProceduralTool;

pub struct ReconnectTool;

impl ProceduralTool for ReconnectTool {
    fn key(&self) -> &'static str {
        "reconnect_db"
    }

    fn run(&self, ctx: &ToolContext<'_>, _args: &Map<String, Value>) -> EngineResult<Value> {
        if ctx.engine.data_connected() {
            return Ok(Value::String(
                "Business database is already connected.".to_string(),
            ));
        }
        let message = ctx.engine.reconnect_data()?;
        Ok(Value::String(message))
    }
}
