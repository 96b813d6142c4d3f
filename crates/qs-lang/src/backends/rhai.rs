use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use qs_core::{Bindings, FunctionBindings, LanguageError, Value};
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};

use super::bridge::{dynamic_to_value, value_to_dynamic};
use super::functions::extract_function_sources;
use crate::interpreter::Interpreter;
use crate::summary::{summarize_environment, FunctionStubber};

/// Budgets enforced on every script run. Exceeding any of them aborts the
/// run with `LanguageError::ResourceExceeded` instead of hanging the host.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_millis: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_operations: 200_000,
            max_call_levels: 48,
            max_expr_depth: 64,
            max_millis: 1_000,
        }
    }
}

/// The sandboxed Rhai backend. Variables and functions live outside the
/// engine; every call builds a fresh engine with the configured budgets,
/// runs, and harvests the scope back into plain values.
pub struct RhaiBackend {
    variables: Bindings,
    functions: FunctionBindings,
    stubber: FunctionStubber,
    limits: ExecutionLimits,
}

impl RhaiBackend {
    pub fn new(variables: Bindings, functions: FunctionBindings) -> Self {
        Self::with_limits(variables, functions, ExecutionLimits::default())
    }

    pub fn with_limits(
        variables: Bindings,
        functions: FunctionBindings,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            variables,
            functions,
            stubber: FunctionStubber::new(),
            limits,
        }
    }

    fn sandbox_engine(&self, print_sink: Option<Rc<RefCell<String>>>) -> Engine {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_operations(self.limits.max_operations);
        engine.set_max_call_levels(self.limits.max_call_levels);
        engine.set_max_expr_depths(self.limits.max_expr_depth, self.limits.max_expr_depth);

        let deadline = Instant::now() + Duration::from_millis(self.limits.max_millis);
        engine.on_progress(move |_| {
            if Instant::now() >= deadline {
                Some(Dynamic::from("wall-clock budget exceeded"))
            } else {
                None
            }
        });

        if let Some(sink) = print_sink {
            engine.on_print(move |text| {
                let mut buffer = sink.borrow_mut();
                buffer.push_str(text);
                buffer.push('\n');
            });
        }

        engine
    }

    fn seeded_scope(&self) -> Result<Scope<'static>, LanguageError> {
        let mut scope = Scope::new();
        for (name, value) in &self.variables {
            scope.push_dynamic(name.clone(), value_to_dynamic(value)?);
        }
        Ok(scope)
    }

    /// Merges previously captured function definitions into the source so a
    /// fresh interpreter restored from persisted state still sees them.
    /// Rhai hoists script functions, so they are appended: the caller's
    /// code keeps its own line numbers for error reporting. Names the code
    /// redefines are skipped so the new definition wins.
    fn with_function_definitions(&self, code: &str) -> String {
        if self.functions.is_empty() {
            return code.to_string();
        }
        let redefined = extract_function_sources(code)
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        let mut source = code.to_string();
        for (name, body) in &self.functions {
            if redefined.iter().any(|known| known == name) {
                continue;
            }
            source.push('\n');
            source.push_str(body);
        }
        source
    }
}

impl Interpreter for RhaiBackend {
    fn name(&self) -> &'static str {
        "Rhai"
    }

    /// Runs a statement block. Returns the captured print output as text;
    /// top-level `let` bindings become environment variables and function
    /// definitions are captured as source text.
    fn execute(&mut self, code: &str) -> Result<Value, LanguageError> {
        let output = Rc::new(RefCell::new(String::new()));
        let engine = self.sandbox_engine(Some(Rc::clone(&output)));
        let mut scope = self.seeded_scope()?;
        let source = self.with_function_definitions(code);

        engine
            .run_with_scope(&mut scope, &source)
            .map_err(map_rhai_error)?;

        let mut variables = Bindings::new();
        for (name, _, value) in scope.iter() {
            // Closures and other engine-only values cannot be persisted;
            // they are dropped from the environment.
            if let Ok(value) = dynamic_to_value(value) {
                variables.insert(name.to_string(), value);
            }
        }
        self.variables = variables;

        for (name, body) in extract_function_sources(code) {
            self.functions.insert(name, body);
        }

        let captured = output.borrow().trim_end_matches('\n').to_string();
        Ok(Value::Text(captured))
    }

    /// Evaluates a single expression against a copy of the environment;
    /// mutations made during evaluation are discarded.
    fn evaluate(&mut self, expr: &str) -> Result<Value, LanguageError> {
        let engine = self.sandbox_engine(None);
        let mut scope = self.seeded_scope()?;
        let source = self.with_function_definitions(&format!("({})", expr.trim()));

        let result = engine
            .eval_with_scope::<Dynamic>(&mut scope, &source)
            .map_err(map_rhai_error)?;
        dynamic_to_value(result)
    }

    fn get_variables(&self) -> Bindings {
        self.variables.clone()
    }

    fn set_variables(&mut self, variables: Bindings) {
        if variables.is_empty() {
            return;
        }
        self.variables = variables;
    }

    fn get_functions(&self) -> FunctionBindings {
        self.functions.clone()
    }

    fn set_functions(&mut self, functions: FunctionBindings) {
        if functions.is_empty() {
            return;
        }
        self.functions = functions;
    }

    fn summarize_variables(&mut self) -> BTreeMap<String, String> {
        summarize_environment(&self.variables, &self.functions, &mut self.stubber)
    }
}

fn map_rhai_error(error: Box<EvalAltResult>) -> LanguageError {
    let message = positioned_message(error.to_string(), error.position());
    match *error {
        EvalAltResult::ErrorParsing(..) => LanguageError::Syntax(message),
        EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorDataTooLarge(..)
        | EvalAltResult::ErrorTerminated(..) => LanguageError::ResourceExceeded(message),
        _ => LanguageError::Runtime(message),
    }
}

fn positioned_message(message: String, position: Position) -> String {
    match position.line() {
        Some(line) => format!("{}: {}", line, message),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RhaiBackend {
        RhaiBackend::new(Bindings::new(), FunctionBindings::new())
    }

    #[test]
    fn execute_defines_variables_and_returns_print_output() {
        let mut interpreter = backend();
        let result = interpreter
            .execute("let x = 3;\nlet y = x + 1;\nprint(x);")
            .expect("execute");
        assert_eq!(result, Value::Text("3".to_string()));
        assert_eq!(interpreter.get_variable("x"), Some(Value::Number(3.0)));
        assert_eq!(interpreter.get_variable("y"), Some(Value::Number(4.0)));
    }

    #[test]
    fn evaluate_returns_value_and_discards_mutations() {
        let mut interpreter = backend();
        interpreter.execute("let x = 3;").expect("execute");

        let result = interpreter.evaluate("x + 39").expect("evaluate");
        assert_eq!(result, Value::Number(42.0));
        // The expression wrapper rejects statement blocks, so evaluation
        // cannot mutate the environment.
        assert!(interpreter.evaluate("x = 9; x").is_err());
        assert_eq!(interpreter.get_variable("x"), Some(Value::Number(3.0)));
    }

    #[test]
    fn functions_are_captured_as_source_and_survive_restore() {
        let mut interpreter = backend();
        interpreter
            .execute("fn double(n) { n * 2 }\nlet x = double(4);")
            .expect("execute");
        assert_eq!(interpreter.get_variable("x"), Some(Value::Number(8.0)));

        let functions = interpreter.get_functions();
        assert_eq!(
            functions.get("double").map(String::as_str),
            Some("fn double(n) { n * 2 }")
        );

        let mut restored = RhaiBackend::new(interpreter.get_variables(), functions);
        assert_eq!(
            restored.evaluate("double(10)").expect("evaluate"),
            Value::Number(20.0)
        );
    }

    #[test]
    fn restored_functions_do_not_shift_error_lines() {
        let mut interpreter = backend();
        interpreter
            .execute("fn double(n) { n * 2 }")
            .expect("execute");

        let mut restored =
            RhaiBackend::new(interpreter.get_variables(), interpreter.get_functions());
        let error = restored
            .execute("let a = double(2);\nlet b = a.undefined();")
            .expect_err("unknown method");
        let info = restored.error_information(&error);
        assert_eq!(info.line_number, Some(2));
    }

    #[test]
    fn redefining_a_restored_function_uses_the_new_definition() {
        let mut interpreter = backend();
        interpreter.execute("fn f(n) { n + 1 }").expect("execute");

        let mut restored =
            RhaiBackend::new(interpreter.get_variables(), interpreter.get_functions());
        restored.execute("fn f(n) { n + 10 }").expect("execute");
        assert_eq!(
            restored.evaluate("f(1)").expect("evaluate"),
            Value::Number(11.0)
        );
    }

    #[test]
    fn syntax_errors_are_distinguished_from_runtime_errors() {
        let mut interpreter = backend();
        assert!(matches!(
            interpreter.execute("let x = ;"),
            Err(LanguageError::Syntax(_))
        ));
        // Strict variables mode reports unknown names at parse time.
        assert!(matches!(
            interpreter.evaluate("missing + 1"),
            Err(LanguageError::Syntax(_))
        ));
        assert!(matches!(
            interpreter.evaluate("1 % 0"),
            Err(LanguageError::Runtime(_))
        ));
    }

    #[test]
    fn unbounded_loop_hits_the_operation_budget() {
        let mut interpreter = RhaiBackend::with_limits(
            Bindings::new(),
            FunctionBindings::new(),
            ExecutionLimits {
                max_operations: 10_000,
                ..ExecutionLimits::default()
            },
        );
        let error = interpreter
            .execute("let n = 0; loop { n += 1; }")
            .expect_err("loop should be cut off");
        assert!(error.is_resource_exceeded());
    }

    #[test]
    fn runaway_recursion_hits_the_call_depth_budget() {
        let mut interpreter = backend();
        let error = interpreter
            .execute("fn f(n) { f(n + 1) }\nlet x = f(0);")
            .expect_err("recursion should be cut off");
        assert!(error.is_resource_exceeded());
    }

    #[test]
    fn set_variables_with_empty_mapping_is_a_no_op() {
        let mut interpreter = backend();
        interpreter.execute("let x = 1;").expect("execute");
        interpreter.set_variables(Bindings::new());
        assert_eq!(interpreter.get_variable("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn summarize_flattens_arrays_zero_based_and_stubs_functions() {
        let mut interpreter = backend();
        interpreter
            .execute("let x = [1, 2, 3];\nlet t = #{x: 3, y: 4};\nfn f() { 1 }")
            .expect("execute");
        let summary = interpreter.summarize_variables();
        assert_eq!(summary.get("x[0]").map(String::as_str), Some("1"));
        assert_eq!(summary.get("x[2]").map(String::as_str), Some("3"));
        assert_eq!(summary.get("t.x").map(String::as_str), Some("3"));
        assert_eq!(summary.get("t.y").map(String::as_str), Some("4"));
        assert_eq!(summary.get("f").map(String::as_str), Some("<function #0>"));
    }

    #[test]
    fn error_information_recovers_line_numbers() {
        let mut interpreter = backend();
        let error = interpreter
            .execute("let x = 1;\nlet y = undefined_name;")
            .expect_err("undefined variable");
        let info = interpreter.error_information(&error);
        assert_eq!(info.line_number, Some(2));
    }
}
