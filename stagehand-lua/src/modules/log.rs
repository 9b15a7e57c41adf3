//! `log` module for pipeline definitions
//!
//! Messages are emitted as tracing events under the `stagehand::definition`
//! target, so they follow the host's log filter.

use crate::module::DefinitionModule;
use mlua::prelude::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogModule;

impl LogModule {
    pub fn new() -> Self {
        Self
    }
}

impl DefinitionModule for LogModule {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let log_table = lua.create_table()?;

        log_table.set(
            "debug",
            lua.create_function(|_, msg: String| {
                tracing::debug!(target: "stagehand::definition", "{}", msg);
                Ok(())
            })?,
        )?;
        log_table.set(
            "info",
            lua.create_function(|_, msg: String| {
                tracing::info!(target: "stagehand::definition", "{}", msg);
                Ok(())
            })?,
        )?;
        log_table.set(
            "warn",
            lua.create_function(|_, msg: String| {
                tracing::warn!(target: "stagehand::definition", "{}", msg);
                Ok(())
            })?,
        )?;

        lua.globals().set(self.id(), log_table)?;
        Ok(())
    }
}
