//! Maps language names to backend constructors. Hosts create one registry
//! at startup and use it for every attempt; custom backends can be
//! registered alongside the built-in ones.

use std::collections::BTreeSet;

use qs_core::{Bindings, ConfigError, FunctionBindings};

use crate::backends::mathscript::MathScriptBackend;
use crate::backends::rhai::RhaiBackend;
use crate::interpreter::Interpreter;

/// Builds a fresh interpreter seeded with an environment.
pub type BackendConstructor = fn(Bindings, FunctionBindings) -> Box<dyn Interpreter>;

pub struct LanguageRegistry {
    constructors: std::collections::BTreeMap<String, BackendConstructor>,
}

impl LanguageRegistry {
    /// An empty registry with no languages. Most hosts want
    /// [`LanguageRegistry::with_builtin_languages`] instead.
    pub fn new() -> Self {
        Self {
            constructors: std::collections::BTreeMap::new(),
        }
    }

    pub fn with_builtin_languages() -> Self {
        let mut registry = Self::new();
        registry.register("rhai", |variables, functions| {
            Box::new(RhaiBackend::new(variables, functions))
        });
        registry.register("mathscript", |variables, functions| {
            Box::new(MathScriptBackend::new(variables, functions))
        });
        registry
    }

    pub fn register(&mut self, language: &str, constructor: BackendConstructor) {
        self.constructors.insert(language.to_string(), constructor);
    }

    pub fn available_languages(&self) -> BTreeSet<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Creates an interpreter for the named language. Questions written
    /// before the language column existed carry an empty name, which maps
    /// to mathscript.
    pub fn create_interpreter(
        &self,
        language: &str,
        variables: Option<Bindings>,
        functions: Option<FunctionBindings>,
    ) -> Result<Box<dyn Interpreter>, ConfigError> {
        let language = if language.trim().is_empty() {
            "mathscript"
        } else {
            language
        };
        let constructor = self
            .constructors
            .get(language)
            .ok_or_else(|| ConfigError::UnknownLanguage(language.to_string()))?;
        Ok(constructor(
            variables.unwrap_or_default(),
            functions.unwrap_or_default(),
        ))
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_builtin_languages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_languages_are_listed() {
        let registry = LanguageRegistry::with_builtin_languages();
        let languages = registry.available_languages();
        assert!(languages.contains("rhai"));
        assert!(languages.contains("mathscript"));
    }

    #[test]
    fn creates_interpreters_by_name() {
        let registry = LanguageRegistry::with_builtin_languages();
        let interpreter = registry
            .create_interpreter("rhai", None, None)
            .expect("create");
        assert_eq!(interpreter.name(), "Rhai");
    }

    #[test]
    fn empty_language_name_falls_back_to_mathscript() {
        let registry = LanguageRegistry::with_builtin_languages();
        let interpreter = registry
            .create_interpreter("", None, None)
            .expect("create");
        assert_eq!(interpreter.name(), "MathScript");
    }

    #[test]
    fn unknown_language_is_a_config_error() {
        let registry = LanguageRegistry::with_builtin_languages();
        assert!(matches!(
            registry.create_interpreter("lua", None, None),
            Err(ConfigError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn seeded_environment_reaches_the_interpreter() {
        let registry = LanguageRegistry::with_builtin_languages();
        let mut variables = Bindings::new();
        variables.insert("x".to_string(), qs_core::Value::Number(7.0));
        let mut interpreter = registry
            .create_interpreter("rhai", Some(variables), None)
            .expect("create");
        assert_eq!(
            interpreter.evaluate("x").expect("evaluate"),
            qs_core::Value::Number(7.0)
        );
    }
}
