//! The workflow chain exposed as a system tool.

use serde_json::{Map, Value};

use crate::chain;
use crate::engine::ToolContext;
use crate::error::EngineResult;
use crate::plugins::ProceduralTool;

pub struct ChainTool;

impl ProceduralTool for ChainTool {
    fn key(&self) -> &'static str {
        "system_run_chain"
    }

    fn run(&self, ctx: &ToolContext<'_>, args: &Map<String, Value>) -> EngineResult<Value> {
        let steps = chain::parse_steps(args)?;
        chain::run_chain(&steps, |tool, step_args| ctx.execute(tool, step_args))
    }
}
