//! The host-facing API: attempt lifecycle, question-text rendering, grading,
//! and the authoring-time script checker. Everything here works through the
//! [`qs_lang::LanguageRegistry`], so hosts stay agnostic of which backend a
//! question uses.

pub mod grading;
pub mod response;
pub mod template;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use qs_core::{
    decode_functions, decode_variables, encode_functions, encode_variables, Bindings, ConfigError,
    DecodeError, ErrorInfo, FunctionBindings, LanguageError,
};
use qs_lang::{Interpreter, LanguageRegistry};

pub use grading::{compare_response, correct_response};
pub use response::{
    is_complete_response, parse_response, validation_error, Answer, AnswerMode, ResponseMode,
};
pub use template::{substitute_inline, ERROR_PLACEHOLDER};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Language(#[from] LanguageError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The per-attempt environment, persisted between steps as the `_vars` and
/// `_funcs` blobs.
#[derive(Debug, Clone, Default)]
pub struct AttemptState {
    pub variables: Bindings,
    pub functions: FunctionBindings,
}

impl AttemptState {
    pub fn from_interpreter(interpreter: &dyn Interpreter) -> Self {
        Self {
            variables: interpreter.get_variables(),
            functions: interpreter.get_functions(),
        }
    }

    /// `(variables, functions)` blobs in persistence order.
    pub fn encode(&self) -> (String, String) {
        (
            encode_variables(&self.variables),
            encode_functions(&self.functions),
        )
    }

    pub fn decode(variables_blob: &str, functions_blob: &str) -> Result<Self, DecodeError> {
        Ok(Self {
            variables: decode_variables(variables_blob)?,
            functions: decode_functions(functions_blob)?,
        })
    }
}

/// Runs a question's init script in a fresh interpreter and captures the
/// environment it produced. Called once when an attempt starts; the state is
/// persisted and every later step resumes from it.
pub fn start_attempt(
    registry: &LanguageRegistry,
    language: &str,
    init_code: &str,
) -> Result<AttemptState, ApiError> {
    let mut interpreter = registry.create_interpreter(language, None, None)?;
    interpreter.execute(init_code)?;
    Ok(AttemptState::from_interpreter(interpreter.as_ref()))
}

/// An interpreter seeded from persisted attempt state.
pub fn resume_attempt(
    registry: &LanguageRegistry,
    language: &str,
    state: &AttemptState,
) -> Result<Box<dyn Interpreter>, ApiError> {
    Ok(registry.create_interpreter(
        language,
        Some(state.variables.clone()),
        Some(state.functions.clone()),
    )?)
}

/// Renders question text for display, substituting its inline code blocks
/// against the attempt environment.
pub fn format_question_text(
    registry: &LanguageRegistry,
    language: &str,
    text: &str,
    state: &AttemptState,
) -> Result<String, ApiError> {
    let mut interpreter = resume_attempt(registry, language, state)?;
    Ok(substitute_inline(text, interpreter.as_mut()))
}

/// Grades a raw response against the question's answer rows, in row order.
/// Returns the first matching row, or `None` when nothing matched.
pub fn grade_response<'a>(
    registry: &LanguageRegistry,
    language: &str,
    state: &AttemptState,
    answer_mode: AnswerMode,
    response_mode: ResponseMode,
    answers: &'a [Answer],
    raw_response: &str,
) -> Result<Option<&'a Answer>, ApiError> {
    let response = parse_response(response_mode, raw_response);
    let mut interpreter = resume_attempt(registry, language, state)?;
    for answer in answers {
        let matched = compare_response(
            interpreter.as_mut(),
            answer_mode,
            response_mode,
            &answer.expression,
            &response,
        )?;
        if matched {
            return Ok(Some(answer));
        }
    }
    Ok(None)
}

/// What the authoring-time checker reports: the first error hit (if any) and
/// a flattened view of every variable the script defined.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub error: Option<ErrorInfo>,
    pub variables: BTreeMap<String, String>,
}

/// Dry-runs a question script for the editor. The script runs in a fresh
/// interpreter; if it succeeds and a target expression is given (usually the
/// first answer), that is evaluated too. Script failures are the report's
/// payload, not an `Err`.
pub fn check_script(
    registry: &LanguageRegistry,
    language: &str,
    script: &str,
    target: Option<&str>,
) -> Result<CheckReport, ApiError> {
    let mut interpreter = registry.create_interpreter(language, None, None)?;

    let error = match interpreter.execute(script) {
        Err(error) => Some(interpreter.error_information(&error)),
        Ok(_) => match target.map(str::trim).filter(|target| !target.is_empty()) {
            Some(target) => interpreter
                .evaluate(target)
                .err()
                .map(|error| interpreter.error_information(&error)),
            None => None,
        },
    };

    Ok(CheckReport {
        error,
        variables: interpreter.summarize_variables(),
    })
}
