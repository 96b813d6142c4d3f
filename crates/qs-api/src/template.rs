//! Inline-code substitution for question text. Authors embed script in two
//! forms: `{{ ... }}` blocks run as statements (their printed output is
//! inserted), and `{ ... }` blocks evaluate as expressions (their value is
//! inserted). The double-brace pass runs first so its braces are consumed
//! before the single-brace pass scans the text.

use regex::{Captures, Regex};

use qs_core::display_text;
use qs_lang::Interpreter;

/// Inserted in place of an inline block that failed to run. The question
/// still renders; the author sees where the template broke.
pub const ERROR_PLACEHOLDER: &str = "error";

pub fn substitute_inline(text: &str, interpreter: &mut dyn Interpreter) -> String {
    let execute_pattern =
        Regex::new(r"(?s)\{\{(.*?)\}\}").expect("inline execute pattern must compile");
    let evaluate_pattern =
        Regex::new(r"\{([^{}]+)\}").expect("inline evaluate pattern must compile");

    let executed = execute_pattern.replace_all(text, |captures: &Captures| {
        match interpreter.execute(&captures[1]) {
            Ok(value) => display_text(&value),
            Err(_) => ERROR_PLACEHOLDER.to_string(),
        }
    });

    evaluate_pattern
        .replace_all(&executed, |captures: &Captures| {
            match interpreter.evaluate(&captures[1]) {
                Ok(value) => display_text(&value),
                Err(_) => ERROR_PLACEHOLDER.to_string(),
            }
        })
        .into_owned()
}
