use mlua::prelude::*;

/// A host-provided module made available to pipeline definitions
///
/// Modules are registered as Lua globals under their `id()` before the
/// definition file is evaluated.
///
/// # Example
///
/// ```rust
/// use stagehand_lua::module::DefinitionModule;
/// use mlua::prelude::*;
///
/// struct Defaults;
///
/// impl DefinitionModule for Defaults {
///     fn id(&self) -> &'static str {
///         "defaults"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let table = lua.create_table()?;
///         table.set("stage", "@my_stage")?;
///         lua.globals().set(self.id(), table)?;
///         Ok(())
///     }
/// }
/// ```
pub trait DefinitionModule: Send + Sync {
    /// Global name of the module inside the sandbox
    ///
    /// Must be a valid Lua identifier and unique within a registry.
    fn id(&self) -> &'static str;

    /// Registers this module's functions and values into the Lua context
    ///
    /// # Errors
    /// Returns `LuaError` if a function or table cannot be created
    fn register(&self, lua: &Lua) -> LuaResult<()>;
}

/// Set of modules loaded into every definition sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn DefinitionModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Panics
    /// Panics if a module with the same ID is already registered
    pub fn register<M: DefinitionModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    /// Builder-style variant of [`ModuleRegistry::register`]
    pub fn with<M: DefinitionModule + 'static>(mut self, module: M) -> Self {
        self.register(module);
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn DefinitionModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    /// Registers all modules into a Lua context
    ///
    /// # Errors
    /// Returns the first error encountered during registration
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestModule;

    impl DefinitionModule for TestModule {
        fn id(&self) -> &'static str {
            "test"
        }

        fn register(&self, lua: &Lua) -> LuaResult<()> {
            let table = lua.create_table()?;
            table.set("value", 42)?;
            lua.globals().set(self.id(), table)?;
            Ok(())
        }
    }

    #[test]
    fn test_module_registration() {
        let registry = ModuleRegistry::new().with(TestModule);

        assert!(registry.get("test").is_some());
        assert!(registry.get("nonexistent").is_none());

        let lua = Lua::new();
        registry.register_all(&lua).unwrap();
        let value: i32 = lua.load("return test.value").eval().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration() {
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule);
        registry.register(TestModule);
    }
}
