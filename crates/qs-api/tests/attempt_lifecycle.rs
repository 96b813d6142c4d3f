//! End-to-end attempt flows: init script, persistence, rendering, grading,
//! and the authoring-time checker, driven through the registry the way a
//! host would.

use qs_api::{
    check_script, format_question_text, grade_response, start_attempt, Answer, AnswerMode,
    AttemptState, ResponseMode,
};
use qs_core::Value;
use qs_lang::LanguageRegistry;

fn registry() -> LanguageRegistry {
    LanguageRegistry::with_builtin_languages()
}

fn answers(rows: &[(&str, f64)]) -> Vec<Answer> {
    rows.iter()
        .map(|(expression, fraction)| Answer {
            expression: (*expression).to_string(),
            fraction: *fraction,
            feedback: String::new(),
        })
        .collect()
}

#[test]
fn attempt_round_trips_through_persisted_blobs() {
    let registry = registry();
    let state = start_attempt(&registry, "rhai", "let x = 3;\nlet y = x + 1;").expect("start");
    assert_eq!(state.variables.get("x"), Some(&Value::Number(3.0)));

    let (vars_blob, funcs_blob) = state.encode();
    let restored = AttemptState::decode(&vars_blob, &funcs_blob).expect("decode");
    assert_eq!(restored.variables, state.variables);
    assert_eq!(restored.functions, state.functions);
}

#[test]
fn numeric_grading_accepts_the_computed_answer() {
    let registry = registry();
    let state = start_attempt(&registry, "rhai", "let x = 3;").expect("start");
    let rows = answers(&[("x + 3", 1.0)]);

    let graded = grade_response(
        &registry,
        "rhai",
        &state,
        AnswerMode::MustEqual,
        ResponseMode::Numeric,
        &rows,
        "6",
    )
    .expect("grade");
    assert!(graded.is_some());

    let graded = grade_response(
        &registry,
        "rhai",
        &state,
        AnswerMode::MustEqual,
        ResponseMode::Numeric,
        &rows,
        "7",
    )
    .expect("grade");
    assert!(graded.is_none());
}

#[test]
fn string_grading_tolerates_leading_zeros() {
    let registry = registry();
    let state = start_attempt(&registry, "rhai", "let x = 5;").expect("start");
    let rows = answers(&[("x", 1.0)]);

    let graded = grade_response(
        &registry,
        "rhai",
        &state,
        AnswerMode::MustEqual,
        ResponseMode::String,
        &rows,
        "05",
    )
    .expect("grade");
    assert!(graded.is_some());
}

#[test]
fn first_matching_answer_row_wins() {
    let registry = registry();
    let state = start_attempt(&registry, "rhai", "let x = 2;").expect("start");
    let rows = answers(&[("x", 0.5), ("x * 3", 1.0)]);

    let graded = grade_response(
        &registry,
        "rhai",
        &state,
        AnswerMode::MustEqual,
        ResponseMode::Numeric,
        &rows,
        "6",
    )
    .expect("grade")
    .expect("a row should match");
    assert_eq!(graded.fraction, 1.0);
}

#[test]
fn question_text_renders_inline_blocks() {
    let registry = registry();
    let state = start_attempt(
        &registry,
        "rhai",
        "let x = 3;\nlet y = 4;\nlet z = 5.1;",
    )
    .expect("start");

    let rendered = format_question_text(
        &registry,
        "rhai",
        "{x} text {y} words {z}",
        &state,
    )
    .expect("render");
    assert_eq!(rendered, "3 text 4 words 5.1");

    let rendered =
        format_question_text(&registry, "rhai", "{{print(x)}} <b>{y}</b>", &state)
            .expect("render");
    assert_eq!(rendered, "3 <b>4</b>");
}

#[test]
fn mathscript_questions_run_with_an_empty_language_name() {
    let registry = registry();
    let state = start_attempt(&registry, "", "x = 2 + 3").expect("start");
    assert_eq!(state.variables.get("x"), Some(&Value::Number(5.0)));

    let rows = answers(&[("x * 2", 1.0)]);
    let graded = grade_response(
        &registry,
        "",
        &state,
        AnswerMode::MustEqual,
        ResponseMode::Numeric,
        &rows,
        "10",
    )
    .expect("grade");
    assert!(graded.is_some());
}

#[test]
fn broken_init_script_fails_the_attempt() {
    let registry = registry();
    assert!(start_attempt(&registry, "rhai", "let x = ;").is_err());
}

#[test]
fn runaway_init_script_is_cut_off() {
    let registry = registry();
    let error = start_attempt(&registry, "rhai", "let n = 0; loop { n += 1; }")
        .expect_err("infinite loop should be stopped");
    assert!(matches!(
        error,
        qs_api::ApiError::Language(ref language_error) if language_error.is_resource_exceeded()
    ));
}

#[test]
fn check_script_reports_errors_and_variables() {
    let registry = registry();

    let report = check_script(&registry, "rhai", "let x = 3;\nlet y = [1, 2];", None)
        .expect("check");
    assert!(report.error.is_none());
    assert_eq!(report.variables.get("x").map(String::as_str), Some("3"));
    assert_eq!(report.variables.get("y[1]").map(String::as_str), Some("2"));

    let report = check_script(&registry, "rhai", "let x = 1;\nlet y = x.undefined();", None)
        .expect("check");
    let error = report.error.expect("script error");
    assert_eq!(error.line_number, Some(2));

    // A target expression referencing a missing variable is also an error.
    let report = check_script(&registry, "rhai", "let x = 1;", Some("missing + 1"))
        .expect("check");
    assert!(report.error.is_some());
    assert_eq!(report.variables.get("x").map(String::as_str), Some("1"));
}
