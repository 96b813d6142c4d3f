//! Grading: matching a parsed response against an answer expression, and
//! rendering the model answer shown after the attempt closes.

use qs_core::{display_text, loose_equals, numeric_value, LanguageError, Value};
use qs_lang::Interpreter;

use crate::response::{Answer, AnswerMode, ResponseMode};

/// Whether the response matches one answer expression.
///
/// In [`AnswerMode::MustEqual`] the expression is evaluated in the attempt
/// environment and compared against the response; an expression that fails
/// to evaluate is a question bug, so the error propagates. In
/// [`AnswerMode::MustEvalTrue`] the expression sees the response as `resp`
/// (and `response`) and grades by truthiness; there an evaluation error
/// means "did not match", because answer rows routinely test properties
/// the response may not have.
pub fn compare_response(
    interpreter: &mut dyn Interpreter,
    answer_mode: AnswerMode,
    response_mode: ResponseMode,
    answer_expression: &str,
    response: &Value,
) -> Result<bool, LanguageError> {
    match answer_mode {
        AnswerMode::MustEqual => {
            let mut expected = interpreter.evaluate(answer_expression)?;
            if response_mode == ResponseMode::String {
                if let Value::Text(text) = &expected {
                    expected = Value::Text(text.to_lowercase());
                }
            }
            // Numeric-comparable sides compare loosely in every mode; the
            // case-sensitive mode only skips the lower-casing above.
            Ok(loose_equals(&expected, response))
        }
        AnswerMode::MustEvalTrue => {
            interpreter.set_variable("resp", response.clone());
            interpreter.set_variable("response", response.clone());
            match interpreter.evaluate(answer_expression) {
                Ok(value) => Ok(value.is_truthy()),
                Err(_) => Ok(false),
            }
        }
    }
}

/// Renders the model answer for review: the highest-fraction answer row,
/// evaluated and formatted in the response mode's base. There is no single
/// correct answer when grading by predicate, so `MustEvalTrue` yields none.
pub fn correct_response(
    interpreter: &mut dyn Interpreter,
    answer_mode: AnswerMode,
    response_mode: ResponseMode,
    answers: &[Answer],
) -> Option<String> {
    if answer_mode == AnswerMode::MustEvalTrue {
        return None;
    }
    let best = answers.iter().max_by(|a, b| {
        a.fraction
            .partial_cmp(&b.fraction)
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;
    let value = interpreter.evaluate(&best.expression).ok()?;
    Some(render_in_mode(response_mode, &value))
}

fn render_in_mode(mode: ResponseMode, value: &Value) -> String {
    let rendered_radix = |radix: u32| {
        numeric_value(value).and_then(|number| {
            // Digit-string rendering needs a value the i64 cast preserves.
            if !number.is_finite() || number.abs() >= (i64::MAX as f64) {
                return None;
            }
            let integer = number as i64;
            Some(match radix {
                2 => format!("{:b}", integer),
                8 => format!("{:o}", integer),
                _ => format!("{:x}", integer),
            })
        })
    };
    match mode {
        ResponseMode::Binary => rendered_radix(2),
        ResponseMode::Octal => rendered_radix(8),
        ResponseMode::Hexadecimal => rendered_radix(16),
        _ => None,
    }
    .unwrap_or_else(|| display_text(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qs_core::{Bindings, FunctionBindings};
    use qs_lang::RhaiBackend;

    fn interpreter_after(init: &str) -> RhaiBackend {
        let mut interpreter = RhaiBackend::new(Bindings::new(), FunctionBindings::new());
        interpreter.execute(init).expect("init script");
        interpreter
    }

    #[test]
    fn must_equal_compares_numerically() {
        let mut interpreter = interpreter_after("let x = 3;");
        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::Numeric,
            "x + 3",
            &Value::Number(6.0),
        )
        .expect("compare");
        assert!(matched);
    }

    #[test]
    fn must_equal_accepts_leading_zero_text() {
        let mut interpreter = interpreter_after("let x = 5;");
        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::String,
            "x",
            &Value::Text("05".to_string()),
        )
        .expect("compare");
        assert!(matched);
    }

    #[test]
    fn case_sensitive_mode_compares_strictly() {
        let mut interpreter = interpreter_after("let word = \"Paris\";");
        let compare = |interpreter: &mut RhaiBackend, mode, response: &str| {
            compare_response(
                interpreter,
                AnswerMode::MustEqual,
                mode,
                "word",
                &Value::Text(response.to_string()),
            )
            .expect("compare")
        };
        assert!(!compare(
            &mut interpreter,
            ResponseMode::StringCaseSensitive,
            "paris"
        ));
        assert!(compare(
            &mut interpreter,
            ResponseMode::StringCaseSensitive,
            "Paris"
        ));
        // Plain string mode lowercases both sides.
        assert!(compare(&mut interpreter, ResponseMode::String, "paris"));
    }

    #[test]
    fn case_sensitive_mode_still_compares_numbers_loosely() {
        let mut interpreter = interpreter_after("let x = 5;");
        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::StringCaseSensitive,
            "x",
            &Value::Text("05".to_string()),
        )
        .expect("compare");
        assert!(matched);
    }

    #[test]
    fn must_equal_propagates_broken_expressions() {
        let mut interpreter = interpreter_after("let x = 1;");
        let result = compare_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::Numeric,
            "nonexistent + 1",
            &Value::Number(1.0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn must_eval_true_binds_the_response() {
        let mut interpreter = interpreter_after("let low = 2;");
        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEvalTrue,
            ResponseMode::Numeric,
            "resp > low && response < 10",
            &Value::Number(6.0),
        )
        .expect("compare");
        assert!(matched);

        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEvalTrue,
            ResponseMode::Numeric,
            "resp > low",
            &Value::Number(1.0),
        )
        .expect("compare");
        assert!(!matched);
    }

    #[test]
    fn must_eval_true_errors_grade_as_no_match() {
        let mut interpreter = interpreter_after("let x = 1;");
        let matched = compare_response(
            &mut interpreter,
            AnswerMode::MustEvalTrue,
            ResponseMode::Numeric,
            "resp.does_not_exist()",
            &Value::Number(1.0),
        )
        .expect("compare");
        assert!(!matched);
    }

    #[test]
    fn correct_response_picks_the_best_answer_and_formats_the_base() {
        let mut interpreter = interpreter_after("let x = 255;");
        let answers = vec![
            Answer {
                expression: "x - 1".to_string(),
                fraction: 0.5,
                feedback: "close".to_string(),
            },
            Answer {
                expression: "x".to_string(),
                fraction: 1.0,
                feedback: "right".to_string(),
            },
        ];
        let rendered = correct_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::Hexadecimal,
            &answers,
        );
        assert_eq!(rendered.as_deref(), Some("ff"));

        let rendered = correct_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::Numeric,
            &answers,
        );
        assert_eq!(rendered.as_deref(), Some("255"));
    }

    #[test]
    fn out_of_range_numbers_fall_back_to_plain_rendering() {
        let mut interpreter = interpreter_after("let big = 1e300;");
        let answers = vec![Answer {
            expression: "big".to_string(),
            fraction: 1.0,
            feedback: String::new(),
        }];
        let rendered = correct_response(
            &mut interpreter,
            AnswerMode::MustEqual,
            ResponseMode::Hexadecimal,
            &answers,
        )
        .expect("model answer");
        assert_eq!(rendered, 1e300f64.to_string());
        assert!(!rendered.contains("7fffffffffffffff"));
    }

    #[test]
    fn no_model_answer_when_grading_by_predicate() {
        let mut interpreter = interpreter_after("let x = 1;");
        let answers = vec![Answer {
            expression: "resp > 0".to_string(),
            fraction: 1.0,
            feedback: String::new(),
        }];
        assert_eq!(
            correct_response(
                &mut interpreter,
                AnswerMode::MustEvalTrue,
                ResponseMode::Numeric,
                &answers,
            ),
            None
        );
    }
}
