//! Environment module for pipeline definitions
//!
//! Definitions read host-supplied variables through `env` instead of the
//! process environment, so the same file evaluates identically for a local
//! run and a deployment given the same variables.

use crate::module::DefinitionModule;
use mlua::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values treated as true by `env.flag`
const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];

/// Source of the variables visible to a definition
pub trait VarProvider: Send + Sync {
    /// Get a variable by name
    fn get(&self, name: &str) -> Option<String>;

    /// All variable names, in a stable order
    fn keys(&self) -> Vec<String>;
}

/// Fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct StaticVars {
    vars: BTreeMap<String, String>,
}

impl StaticVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticVars {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl VarProvider for StaticVars {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}

/// `env` module: `env.get(name, default?)`, `env.flag(name)`, `env.keys()`
pub struct EnvModule<V: VarProvider> {
    provider: Arc<V>,
}

impl<V: VarProvider> EnvModule<V> {
    pub fn new(provider: V) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

impl<V: VarProvider + 'static> DefinitionModule for EnvModule<V> {
    fn id(&self) -> &'static str {
        "env"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let env_table = lua.create_table()?;

        {
            let provider = self.provider.clone();
            env_table.set(
                "get",
                lua.create_function(move |_, (name, default): (String, Option<String>)| {
                    Ok(provider.get(&name).or(default))
                })?,
            )?;
        }

        // env.flag(name) - true when the variable holds a truthy value
        {
            let provider = self.provider.clone();
            env_table.set(
                "flag",
                lua.create_function(move |_, name: String| {
                    Ok(provider
                        .get(&name)
                        .map(|v| TRUTHY.contains(&v.trim().to_ascii_lowercase().as_str()))
                        .unwrap_or(false))
                })?,
            )?;
        }

        {
            let provider = self.provider.clone();
            env_table.set(
                "keys",
                lua.create_function(move |lua, ()| {
                    let table = lua.create_table()?;
                    for (i, key) in provider.keys().iter().enumerate() {
                        table.set(i + 1, key.as_str())?;
                    }
                    Ok(table)
                })?,
            )?;
        }

        lua.globals().set(self.id(), env_table)?;
        Ok(())
    }
}
