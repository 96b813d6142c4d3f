//! Command-line front end for authoring workflows: dry-run a question
//! script, start an attempt and persist its state, render question text
//! against saved state, and list the available languages.

use std::fs;
use std::path::Path;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use qs_api::{check_script, format_question_text, start_attempt, ApiError, AttemptState};
use qs_lang::LanguageRegistry;

const ATTEMPT_STATE_SCHEMA: &str = "attempt-state.v1";

#[derive(Debug, Parser)]
#[command(name = "qscript")]
#[command(about = "Scripted-question authoring CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dry-run a question script and report errors and defined variables.
    Check(CheckArgs),
    /// Run a question's init script and save the attempt state.
    Init(InitArgs),
    /// Render question text against saved attempt state.
    Render(RenderArgs),
    /// List the registered scripting languages.
    Languages,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long = "language", default_value = "")]
    language: String,
    #[arg(long = "script")]
    script: String,
    /// Answer expression to check against the script's environment.
    #[arg(long = "answer")]
    answer: Option<String>,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long = "language", default_value = "")]
    language: String,
    #[arg(long = "script")]
    script: String,
    #[arg(long = "state-out")]
    state_out: String,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[arg(long = "state-in")]
    state_in: String,
    #[arg(long = "text")]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptStateFile {
    schema_version: String,
    language: String,
    vars: String,
    funcs: String,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let registry = LanguageRegistry::with_builtin_languages();
    match cli.command {
        Command::Check(args) => run_check(&registry, args),
        Command::Init(args) => run_init(&registry, args),
        Command::Render(args) => run_render(&registry, args),
        Command::Languages => run_languages(&registry),
    }
}

/// Mirrors the authoring editor's check endpoint: one JSON line with the
/// error (or `null`), then a `name<TAB>value` row per defined variable.
fn run_check(registry: &LanguageRegistry, args: CheckArgs) -> Result<i32, CliError> {
    let script = read_file(&args.script)?;
    let report = check_script(registry, &args.language, &script, args.answer.as_deref())?;

    println!(
        "{}",
        serde_json::to_string(&report.error).unwrap_or_else(|_| "null".to_string())
    );
    for (name, value) in &report.variables {
        println!("{}\t{}", name, value);
    }

    Ok(if report.error.is_some() { 1 } else { 0 })
}

fn run_init(registry: &LanguageRegistry, args: InitArgs) -> Result<i32, CliError> {
    let script = read_file(&args.script)?;
    let state = start_attempt(registry, &args.language, &script)?;

    let (vars, funcs) = state.encode();
    let file = AttemptStateFile {
        schema_version: ATTEMPT_STATE_SCHEMA.to_string(),
        language: args.language,
        vars,
        funcs,
    };
    save_state_file(Path::new(&args.state_out), &file)?;
    println!("saved: {}", args.state_out);

    Ok(0)
}

fn run_render(registry: &LanguageRegistry, args: RenderArgs) -> Result<i32, CliError> {
    let file = load_state_file(Path::new(&args.state_in))?;
    let state = AttemptState::decode(&file.vars, &file.funcs).map_err(ApiError::from)?;

    let text = read_file(&args.text)?;
    let rendered = format_question_text(registry, &file.language, &text, &state)?;
    println!("{}", rendered);

    Ok(0)
}

fn run_languages(registry: &LanguageRegistry) -> Result<i32, CliError> {
    for language in registry.available_languages() {
        println!("{}", language);
    }
    Ok(0)
}

fn read_file(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|error| CliError::Io {
        path: path.to_string(),
        message: error.to_string(),
    })
}

fn save_state_file(path: &Path, file: &AttemptStateFile) -> Result<(), CliError> {
    let io_error = |error: std::io::Error| CliError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_error)?;

    let payload = serde_json::to_string(file).map_err(|error| CliError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    fs::write(path, payload).map_err(io_error)
}

fn load_state_file(path: &Path) -> Result<AttemptStateFile, CliError> {
    let raw = fs::read_to_string(path).map_err(|error| CliError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;

    let file: AttemptStateFile = serde_json::from_str(&raw).map_err(|error| CliError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;

    if file.schema_version != ATTEMPT_STATE_SCHEMA {
        return Err(CliError::Schema(file.schema_version));
    }

    Ok(file)
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{path}: {message}")]
    Io { path: String, message: String },
    #[error("unsupported attempt state schema: {0}")]
    Schema(String),
}
