//! Lua sandbox creation
//!
//! Pipeline files only declare structure, so the sandbox carries no I/O,
//! process or module-loading capability. The `pipeline` module is always
//! injected; host modules (`env`, `log`) are added by the caller.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib, Table};

/// Create a restricted Lua sandbox
///
/// Only the table, string, math and coroutine libraries are loaded, and
/// `require`, `dofile` and `loadfile` are removed.
///
/// # Example
/// ```no_run
/// use stagehand_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox()?;
/// let definition: mlua::Table = lua
///     .load(r#"return pipeline.define { name = "p", nodes = {} }"#)
///     .eval()?;
/// let name: String = definition.get("name")?;
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = unsafe {
        Lua::unsafe_new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE,
            LuaOptions::default(),
        )
    };

    lua.globals().set("require", mlua::Nil)?;
    lua.globals().set("dofile", mlua::Nil)?;
    lua.globals().set("loadfile", mlua::Nil)?;

    register_pipeline_module(&lua)?;

    Ok(lua)
}

/// Register the `pipeline` module
///
/// `pipeline.define` and `pipeline.node` return their table as-is; they exist
/// so definition files read declaratively. `pipeline.builder()` offers the
/// same structure through chained calls.
fn register_pipeline_module(lua: &Lua) -> LuaResult<()> {
    let pipeline = lua.create_table()?;

    let define_fn = lua.create_function(|_, definition: Table| Ok(definition))?;
    pipeline.set("define", define_fn)?;

    let node_fn = lua.create_function(|_, config: Table| Ok(config))?;
    pipeline.set("node", node_fn)?;

    let builder_fn = lua.create_function(|lua, ()| create_pipeline_builder(lua))?;
    pipeline.set("builder", builder_fn)?;

    lua.globals().set("pipeline", pipeline)?;

    Ok(())
}

/// Create a pipeline builder instance with fluent API methods
fn create_pipeline_builder(lua: &Lua) -> LuaResult<Table> {
    let builder = lua.create_table()?;
    let metatable = lua.create_table()?;

    let name_fn = lua.create_function(|_, (builder, name): (Table, String)| {
        builder.set("_name", name)?;
        Ok(builder)
    })?;
    metatable.set("name", name_fn)?;

    // Appends so declaration order follows call order
    let node_fn = lua.create_function(|lua, (builder, node): (Table, Table)| {
        let nodes: Table = match builder.get::<Option<Table>>("_nodes")? {
            Some(t) => t,
            None => {
                let t = lua.create_table()?;
                builder.set("_nodes", t.clone())?;
                t
            }
        };
        let len = nodes.raw_len() + 1;
        nodes.set(len, node)?;
        Ok(builder)
    })?;
    metatable.set("node", node_fn)?;

    let build_fn = lua.create_function(|lua, builder: Table| {
        let definition = lua.create_table()?;

        if let Some(name) = builder.get::<Option<String>>("_name")? {
            definition.set("name", name)?;
        }
        match builder.get::<Option<Table>>("_nodes")? {
            Some(nodes) => definition.set("nodes", nodes)?,
            None => definition.set("nodes", lua.create_table()?)?,
        }

        Ok(definition)
    })?;
    metatable.set("build", build_fn)?;

    metatable.set("__index", metatable.clone())?;
    builder.set_metatable(Some(metatable))?;

    Ok(builder)
}
