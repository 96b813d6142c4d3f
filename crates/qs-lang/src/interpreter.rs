use std::collections::BTreeMap;

use qs_core::{Bindings, ErrorInfo, FunctionBindings, LanguageError, Value};

/// The contract every scripting backend satisfies. One interpreter instance
/// owns one environment; instances are created per attempt operation and
/// never shared.
pub trait Interpreter {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Runs a block of code with side effects on the owned environment and
    /// returns the backend's notion of a return/output value.
    fn execute(&mut self, code: &str) -> Result<Value, LanguageError>;

    /// Evaluates a single expression. Environment mutations made during the
    /// evaluation are not visible after the call.
    fn evaluate(&mut self, expr: &str) -> Result<Value, LanguageError>;

    fn get_variables(&self) -> Bindings;

    /// Replaces the variable namespace. An empty argument is a no-op and
    /// does not clear existing state.
    fn set_variables(&mut self, variables: Bindings);

    /// Functions as source text, keyed by name. Backends without
    /// first-class functions return an empty mapping and ignore sets.
    fn get_functions(&self) -> FunctionBindings;

    fn set_functions(&mut self, functions: FunctionBindings);

    /// Flattens the environment into printable `path -> value` pairs.
    /// Function values appear as stable `<function #N>` stubs.
    fn summarize_variables(&mut self) -> BTreeMap<String, String>;

    fn get_variable(&self, name: &str) -> Option<Value> {
        self.get_variables().get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Value) {
        let mut variables = self.get_variables();
        variables.insert(name.to_string(), value);
        self.set_variables(variables);
    }

    /// Best-effort error details, recovering a line number from the
    /// `"<line>: <rest>"` message convention.
    fn error_information(&self, error: &LanguageError) -> ErrorInfo {
        ErrorInfo::from_message(error.message())
    }
}
