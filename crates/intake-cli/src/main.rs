mod wizard;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use component_intake::{describe, render_json_ui, set_detail, submit_all, submit_patch};
use intake_spec::{
    AnswerSnapshot, CodeEncoder, FormModel, QrPlanner, QuestionType, QuestionnaireSpec,
    ValidationResult, aggregate, load_questionnaire, parse_date, validate,
};
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wizard::{
    AnswerParseError, PromptContext, Verbosity, WizardPayload, WizardPresenter, WizardQuestion,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Filter directives for the stderr logger, e.g. `INTAKE_LOG=intake_spec=debug`.
const LOG_ENV: &str = "INTAKE_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text shell for intake questionnaires",
    long_about = "Fills questionnaires interactively, validates and aggregates answer files, and checks questionnaire documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SchemaKind {
    Questionnaire,
    Answers,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a questionnaire question by question in a text shell.
    Fill {
        /// Path to the questionnaire JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional JSON file containing initial answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show status, enabled questions and visibility changes; log at debug level.
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also print the final answers as JSON.
        #[arg(long)]
        answers_json: bool,
    },
    /// Validate an answers file and print each section's text and QR plan.
    Aggregate {
        /// Path to the questionnaire JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Emit the sections as a JSON array.
        #[arg(long)]
        json: bool,
    },
    /// Validate answers against a questionnaire.
    Validate {
        /// Path to the questionnaire JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Load a questionnaire and report structural problems and warnings.
    Check {
        /// Path to the questionnaire JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,
    },
    /// Print the JSON schema of questionnaire or answer documents.
    Schema {
        #[arg(long, value_enum, default_value_t = SchemaKind::Questionnaire)]
        kind: SchemaKind,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Command::Fill { verbose: true, .. }));
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> CliResult<()> {
    match command {
        Command::Fill {
            spec,
            answers,
            verbose,
            answers_json,
        } => run_fill(spec, answers, verbose, answers_json),
        Command::Aggregate {
            spec,
            answers,
            json,
        } => run_aggregate(spec, answers, json),
        Command::Validate { spec, answers } => run_validate(spec, answers),
        Command::Check { spec, strict } => run_check(spec, strict),
        Command::Schema { kind } => run_schema(kind),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_model(path: &Path) -> CliResult<FormModel> {
    let spec_json = fs::read_to_string(path)?;
    Ok(load_questionnaire(&spec_json)?)
}

fn read_answers(path: &Path) -> CliResult<AnswerSnapshot> {
    let answers_json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&answers_json)?)
}

fn run_validate(spec_path: PathBuf, answers_path: PathBuf) -> CliResult<()> {
    let model = load_model(&spec_path)?;
    let answers = read_answers(&answers_path)?;

    let result = validate(&model, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if let Some(notice) = result.notice() {
        println!("{}", notice);
    }
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {} ({})",
                error.path.as_deref().unwrap_or("<unknown>"),
                error.message,
                error.code.as_deref().unwrap_or("invalid")
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_aggregate(spec_path: PathBuf, answers_path: PathBuf, as_json: bool) -> CliResult<()> {
    let model = load_model(&spec_path)?;
    let answers = read_answers(&answers_path)?;

    let result = validate(&model, &answers);
    if !result.valid {
        describe_validation(&result);
        return Err("validation failed".into());
    }

    let planner = QrPlanner::default();
    let sections = aggregate(&model, &answers);
    debug!(sections = sections.len(), "answers aggregated");

    if as_json {
        let entries = sections
            .iter()
            .map(|section| {
                let mut entry = json!({ "title": section.title, "text": section.text });
                match planner.encode(&section.text) {
                    Ok(plan) => entry["code"] = json!(plan),
                    Err(error) => entry["code_error"] = json!(error.to_string()),
                }
                entry
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for section in &sections {
        println!("== {}", section.title);
        println!("{}", section.text);
        match planner.encode(&section.text) {
            Ok(plan) => println!(
                "QR: version {}, level {}, {}/{} bytes",
                plan.version, plan.error_correction, plan.bytes, plan.capacity
            ),
            Err(error) => println!("QR: failed to encode ({})", error),
        }
    }
    Ok(())
}

fn run_check(spec_path: PathBuf, strict: bool) -> CliResult<()> {
    let model = load_model(&spec_path)?;
    let spec = model.spec();
    println!(
        "Questionnaire '{}': {} sections, {} questions, {} watched by conditions",
        spec.title,
        spec.sections.len(),
        model.questions().count(),
        model.graph().watched_count()
    );
    for warning in model.warnings() {
        println!("warning: {}", warning);
    }

    if strict && !model.warnings().is_empty() {
        return Err(format!("{} warning(s) in strict mode", model.warnings().len()).into());
    }
    Ok(())
}

fn run_schema(kind: SchemaKind) -> CliResult<()> {
    let schema = match kind {
        SchemaKind::Questionnaire => schemars::schema_for!(QuestionnaireSpec),
        SchemaKind::Answers => schemars::schema_for!(AnswerSnapshot),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_fill(
    spec_path: PathBuf,
    answers_path: Option<PathBuf>,
    verbose: bool,
    answers_json: bool,
) -> CliResult<()> {
    let spec_json = fs::read_to_string(&spec_path)?;
    let config_json = json!({ "questionnaire_json": spec_json }).to_string();
    parse_component_result(&describe(&config_json))?;

    let mut answers = match answers_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => json!({}),
    };

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);
    let mut asked = BTreeSet::new();
    let mut current_section = String::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let answers_str = answers.to_string();
        let ui = parse_component_result(&render_json_ui(&config_json, &answers_str))?;
        let payload =
            WizardPayload::from_json(&ui).map_err(|err| format!("wizard UI error: {}", err))?;
        presenter.show_header(&payload);

        let Some((section, question)) = payload.next_question(&asked) else {
            let submission = parse_component_result(&submit_all(&config_json, &answers_str))?;
            if submission["status"] == "complete" {
                presenter.show_completion(&submission, &answers);
                return Ok(());
            }

            presenter.show_notice(submission["notice"].as_str().unwrap_or("validation failed"));
            let result: ValidationResult =
                serde_json::from_value(submission["validation"].clone())?;
            describe_validation(&result);
            let mut reopened = false;
            for question_id in questions_to_revisit(&result) {
                reopened |= asked.remove(&question_id);
            }
            if !reopened {
                return Err("validation failed".into());
            }
            continue;
        };

        presenter.show_status(&payload);
        if current_section != section {
            presenter.show_section(section);
            current_section = section.to_string();
        }
        let prompt = PromptContext::new(question, &payload.progress);
        answers = ask_question(&mut input, &presenter, &prompt, question, &config_json, answers)?;
        debug!(question = %question.id, "question answered");
        asked.insert(question.id.clone());
    }
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn questions_to_revisit(result: &ValidationResult) -> Vec<String> {
    let mut ids = result.missing_required.clone();
    ids.extend(
        result
            .errors
            .iter()
            .filter_map(|error| error.question_id.clone()),
    );
    ids
}

fn ask_question(
    input: &mut impl BufRead,
    presenter: &WizardPresenter,
    prompt: &PromptContext,
    question: &WizardQuestion,
    config_json: &str,
    answers: Value,
) -> CliResult<Value> {
    let answers_str = answers.to_string();
    loop {
        presenter.show_prompt(prompt);
        let raw = read_line(input)?;
        if raw.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        let value = match parse_answer(question, &raw) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(answers),
            Err(err) => {
                presenter.show_parse_error(&err);
                continue;
            }
        };

        let response: Value = serde_json::from_str(&submit_patch(
            config_json,
            &answers_str,
            &question.id,
            &value.to_string(),
        ))?;
        if let Some(error) = response.get("error").and_then(Value::as_str) {
            presenter.show_parse_error(&AnswerParseError::new(error, None));
            continue;
        }
        presenter.show_changes(&response["changes"]);
        return collect_details(
            input,
            presenter,
            question,
            config_json,
            response["answers"].clone(),
        );
    }
}

/// Asks for the free text of every selected option that takes one.
fn collect_details(
    input: &mut impl BufRead,
    presenter: &WizardPresenter,
    question: &WizardQuestion,
    config_json: &str,
    mut answers: Value,
) -> CliResult<Value> {
    let selected = selected_labels(&answers, &question.id);
    for (index, option) in question.options.iter().enumerate() {
        if !option.requires_detail || !selected.contains(&option.label) {
            continue;
        }
        presenter.show_detail_prompt(&option.label);
        let text = read_line(input)?;
        if text.is_empty() {
            continue;
        }
        let response = parse_component_result(&set_detail(
            config_json,
            &answers.to_string(),
            &question.id,
            index,
            &text,
        ))?;
        answers = response["answers"].clone();
    }
    Ok(answers)
}

fn selected_labels(answers: &Value, question_id: &str) -> Vec<String> {
    match &answers["answers"][question_id] {
        Value::String(label) => vec![label.clone()],
        Value::Array(labels) => labels
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn read_line(input: &mut impl BufRead) -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err("input closed before the questionnaire was completed".into());
    }
    Ok(line.trim().to_string())
}

/// `Ok(None)` keeps the current answer untouched.
fn parse_answer(question: &WizardQuestion, raw: &str) -> Result<Option<Value>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if question.required && !has_answer(question) {
            return Err(AnswerParseError::new(
                "This question requires an answer.",
                None,
            ));
        }
        return Ok(None);
    }

    match question.kind {
        QuestionType::Text => Ok(Some(Value::String(raw.to_string()))),
        QuestionType::Date => parse_date_input(raw).map(Some),
        QuestionType::Radio => {
            resolve_option(question, raw).map(|label| Some(Value::String(label)))
        }
        QuestionType::Checkbox => {
            parse_selection(question, raw).map(|labels| Some(json!(labels)))
        }
    }
}

fn has_answer(question: &WizardQuestion) -> bool {
    question
        .current_value
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty())
        || question.options.iter().any(|option| option.selected)
}

fn parse_date_input(raw: &str) -> Result<Value, AnswerParseError> {
    match parse_date(raw) {
        Some(_) => Ok(Value::String(raw.to_string())),
        None => Err(AnswerParseError::new(
            "Please enter a date such as 2024-03-05.",
            Some("expected YYYY-MM-DD".to_string()),
        )),
    }
}

/// Accepts a 1-based option number or the exact option label.
fn resolve_option(question: &WizardQuestion, token: &str) -> Result<String, AnswerParseError> {
    let by_number = token
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| question.options.get(index));
    by_number
        .or_else(|| question.options.iter().find(|option| option.label == token))
        .map(|option| option.label.clone())
        .ok_or_else(|| {
            let labels = question
                .options
                .iter()
                .map(|option| option.label.as_str())
                .collect::<Vec<_>>();
            AnswerParseError::new(
                format!("Choose a number from 1 to {}.", question.options.len()),
                Some(format!("allowed values: {}", labels.join(", "))),
            )
        })
}

fn parse_selection(question: &WizardQuestion, raw: &str) -> Result<Vec<String>, AnswerParseError> {
    let mut labels = Vec::new();
    for token in raw
        .split([',', '，', '、', ' '])
        .filter(|token| !token.is_empty())
    {
        let label = resolve_option(question, token)?;
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    if labels.is_empty() {
        return Err(AnswerParseError::new(
            "Pick at least one option.",
            Some("numbers separated by commas".to_string()),
        ));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_spec::ValidationError;

    fn wizard_question(value: Value) -> WizardQuestion {
        serde_json::from_value(value).expect("question")
    }

    fn symptoms() -> WizardQuestion {
        wizard_question(json!({
            "id": "symptoms",
            "title": "伴随症状",
            "type": "checkbox",
            "required": true,
            "enabled": true,
            "options": [
                { "label": "恶心" },
                { "label": "头痛" },
                { "label": "其他", "requires_detail": true },
                { "label": "无伴随症状", "exclusive": true }
            ]
        }))
    }

    #[test]
    fn parse_answer_requires_value_for_required_question() {
        let question = symptoms();
        assert!(parse_answer(&question, "  ").is_err());

        let optional = wizard_question(json!({ "id": "onset", "title": "起病", "type": "date" }));
        assert!(matches!(parse_answer(&optional, ""), Ok(None)));
    }

    #[test]
    fn parse_answer_keeps_existing_answer_on_blank_input() {
        let question = wizard_question(json!({
            "id": "name", "title": "姓名", "type": "text",
            "required": true, "current_value": "张三"
        }));
        assert!(matches!(parse_answer(&question, ""), Ok(None)));
    }

    #[test]
    fn parse_answer_checks_dates() {
        let question = wizard_question(json!({ "id": "birth", "title": "出生日期", "type": "date" }));
        assert_eq!(
            parse_answer(&question, "1990-01-02").expect("date"),
            Some(json!("1990-01-02"))
        );
        assert!(parse_answer(&question, "1990/01/02").is_err());
    }

    #[test]
    fn radio_accepts_number_or_label() {
        let question = wizard_question(json!({
            "id": "fever", "title": "发热", "type": "radio",
            "options": [{ "label": "是" }, { "label": "否" }]
        }));
        assert_eq!(resolve_option(&question, "2").expect("number"), "否");
        assert_eq!(resolve_option(&question, "是").expect("label"), "是");
        assert!(resolve_option(&question, "3").is_err());
        assert!(resolve_option(&question, "0").is_err());
    }

    #[test]
    fn selection_splits_on_common_separators() {
        let question = symptoms();
        assert_eq!(
            parse_selection(&question, "1，3、1 头痛").expect("selection"),
            vec!["恶心", "其他", "头痛"]
        );
        assert!(parse_selection(&question, "1,9").is_err());
        assert!(parse_selection(&question, ",,").is_err());
    }

    #[test]
    fn selected_labels_reads_both_answer_shapes() {
        let answers = json!({
            "answers": { "fever": "是", "symptoms": ["头痛", "其他"] }
        });
        assert_eq!(selected_labels(&answers, "fever"), vec!["是"]);
        assert_eq!(selected_labels(&answers, "symptoms"), vec!["头痛", "其他"]);
        assert!(selected_labels(&answers, "name").is_empty());
    }

    #[test]
    fn revisits_missing_and_invalid_questions() {
        let result = ValidationResult {
            valid: false,
            errors: vec![ValidationError {
                question_id: Some("birth".into()),
                path: Some("/birth".into()),
                message: "date must be formatted as YYYY-MM-DD".into(),
                code: Some("invalid_date".into()),
            }],
            missing_required: vec!["name".into()],
            unknown_fields: vec!["extra".into()],
        };
        assert_eq!(questions_to_revisit(&result), vec!["name", "birth"]);
    }
}
