mod logging;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use schemodel_model::{
    Error as ModelError, FieldKind, ModelType, Schema, SchemaError, SequenceType,
    ValidationOptions,
};
use serde_json::Value;
use settings::{LogFormat, SettingsError, load_settings};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("invalid --set '{0}': expected <pointer>=<json>")]
    InvalidAssignment(String),
}

#[derive(Parser, Debug)]
#[command(name = "schemodel", version, about = "Validate JSON data against schema-bound models")]
struct Cli {
    /// Settings file (defaults to ./schemodel.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load data into a model and print the canonical result.
    Check(CheckArgs),
    /// Load data, apply pointer assignments one by one, print the result.
    Apply(ApplyArgs),
    /// List the fields a schema declares.
    Fields(FieldsArgs),
}

#[derive(Args, Debug)]
struct ValidationArgs {
    /// Coerce values into their declared types ("3" into 3).
    #[arg(long, default_value_t = false, conflicts_with = "no_coerce")]
    coerce: bool,
    /// Do not coerce, even if the settings file asks for it.
    #[arg(long, default_value_t = false)]
    no_coerce: bool,
    /// Allow required fields to be absent.
    #[arg(long, default_value_t = false, conflicts_with = "no_partial")]
    partial: bool,
    /// Require every required field, even if the settings file allows partial data.
    #[arg(long, default_value_t = false)]
    no_partial: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(long)]
    schema: PathBuf,
    #[arg(long)]
    data: PathBuf,
    #[command(flatten)]
    validation: ValidationArgs,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[arg(long)]
    schema: PathBuf,
    #[arg(long)]
    data: PathBuf,
    /// Assignment of the form /path/to/field=<json>; repeatable.
    #[arg(long = "set", value_name = "POINTER=JSON")]
    assignments: Vec<String>,
    #[command(flatten)]
    validation: ValidationArgs,
}

#[derive(Args, Debug)]
struct FieldsArgs {
    #[arg(long)]
    schema: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    logging::init_logging(&settings.logging).map_err(CliError::Logging)?;

    let defaults = settings.validation;
    match cli.command {
        Command::Check(args) => run_check(args, defaults),
        Command::Apply(args) => run_apply(args, defaults),
        Command::Fields(args) => run_fields(args),
    }
}

fn run_check(args: CheckArgs, defaults: ValidationOptions) -> Result<(), CliError> {
    let options = merge_options(defaults, &args.validation);
    let schema = Schema::parse(read_json(&args.schema)?)?;
    let data = read_json(&args.data)?;
    tracing::info!(event = "check_started", schema = %args.schema.display(), coerce = options.coerce, partial = options.partial);

    let canonical = match ModelType::compile(&schema, options) {
        Ok(model_type) => {
            let mut model = model_type.empty();
            model.set_data(&data)?;
            model.to_json()
        }
        Err(SchemaError::UnexpectedRoot { found, .. }) if found == "array" => {
            let sequence_type = SequenceType::compile(&schema, options)?;
            let items = match data {
                Value::Array(items) => items,
                other => vec![other],
            };
            sequence_type.create(items)?.to_json()
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(event = "check_passed");
    print_json(&canonical)
}

fn run_apply(args: ApplyArgs, defaults: ValidationOptions) -> Result<(), CliError> {
    let options = merge_options(defaults, &args.validation);
    let schema = Schema::parse(read_json(&args.schema)?)?;
    let model_type = ModelType::compile(&schema, options)?;
    let mut model = model_type.empty();
    model.set_data(&read_json(&args.data)?)?;

    for assignment in &args.assignments {
        let (pointer, value) = parse_assignment(assignment)?;
        model.set_pointer(pointer, value)?;
        tracing::info!(event = "assignment_applied", pointer);
    }
    print_json(&model.to_json())
}

fn run_fields(args: FieldsArgs) -> Result<(), CliError> {
    let schema = Schema::parse(read_json(&args.schema)?)?;
    let model_type = ModelType::compile(&schema, ValidationOptions::default())?;
    print_fields(&model_type, 0);
    Ok(())
}

fn print_fields(model_type: &ModelType, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in model_type.fields() {
        match field.kind() {
            FieldKind::Scalar => println!("{indent}{}", field.name()),
            FieldKind::Union => println!("{indent}{} (union)", field.name()),
            FieldKind::Object(nested) => {
                println!("{indent}{} (model {})", field.name(), nested.pointer());
                print_fields(nested, depth + 1);
            }
            FieldKind::Array(sequence) => match sequence.element_type() {
                Some(element) => {
                    println!("{indent}{}[] (model {})", field.name(), element.pointer());
                    print_fields(element, depth + 1);
                }
                None => println!("{indent}{}[]", field.name()),
            },
        }
    }
}

/// Flags win over the settings file in both directions.
fn merge_options(defaults: ValidationOptions, args: &ValidationArgs) -> ValidationOptions {
    ValidationOptions {
        coerce: flag(defaults.coerce, args.coerce, args.no_coerce),
        partial: flag(defaults.partial, args.partial, args.no_partial),
    }
}

fn flag(default: bool, on: bool, off: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

fn parse_assignment(raw: &str) -> Result<(&str, Value), CliError> {
    let Some((pointer, json)) = raw.split_once('=') else {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    };
    // Bare words are taken as strings so `--set /name=Ann` works.
    let value = serde_json::from_str(json).unwrap_or_else(|_| Value::String(json.to_string()));
    Ok((pointer, value))
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(value).map_err(ModelError::from)?;
    println!("{encoded}");
    Ok(())
}
