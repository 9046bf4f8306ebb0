//! publish / amend / retract: configured step pipelines around one mutation.

use crate::cli::PayloadArgs;
use crate::commands::render::render_or_exit;
use crate::config::{Pipeline, RelnoteConfig};
use crate::support::{
    ScratchFile, fail, print_json, read_payload_or_exit, schema_or_exit, store_op_or_exit,
};
use relnote_steps::{Placeholders, SequenceReport, StepOutcome, StepRunner};
use relnote_store::{RecordSchema, normalize_payload};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Publish,
    Amend,
    Retract,
}

impl PipelineKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Amend => "amend",
            Self::Retract => "retract",
        }
    }

    fn pipeline(self, config: &RelnoteConfig) -> &Pipeline {
        match self {
            Self::Publish => &config.pipelines.insert,
            Self::Amend => &config.pipelines.update,
            Self::Retract => &config.pipelines.remove,
        }
    }
}

pub fn run_publish(
    file: PathBuf,
    group: String,
    payload: PayloadArgs,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, payload.schema.as_deref());
    let scratch = payload_file_or_exit(&schema, &payload, config);
    let placeholders = base_placeholders(&file)
        .with_group_name(group)
        .with_tmp_filename(scratch.path());
    let result = run(PipelineKind::Publish, &schema, &file, &placeholders, config, json_output);
    finish(result, Some(scratch));
}

pub fn run_amend(
    file: PathBuf,
    digest: String,
    payload: PayloadArgs,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, payload.schema.as_deref());
    let scratch = payload_file_or_exit(&schema, &payload, config);
    let placeholders = base_placeholders(&file)
        .with_digest(digest)
        .with_tmp_filename(scratch.path());
    let result = run(PipelineKind::Amend, &schema, &file, &placeholders, config, json_output);
    finish(result, Some(scratch));
}

pub fn run_retract(
    file: PathBuf,
    digest: String,
    schema: Option<String>,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, schema.as_deref());
    let placeholders = base_placeholders(&file).with_digest(digest);
    let result = run(PipelineKind::Retract, &schema, &file, &placeholders, config, json_output);
    finish(result, None);
}

/// Exit only after the scratch payload is gone; `exit` skips destructors.
fn finish(result: Result<(), String>, scratch: Option<ScratchFile>) {
    drop(scratch);
    if let Err(message) = result {
        fail(message);
    }
}

fn base_placeholders(file: &Path) -> Placeholders {
    let output = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    Placeholders::default()
        .with_orig_file(file)
        .with_output_file(output)
}

/// Normalized record text in a scratch file, from `--payload` or `--field`.
///
/// Bad payloads are rejected here, before any step runs.
fn payload_file_or_exit(
    schema: &RecordSchema,
    args: &PayloadArgs,
    config: &RelnoteConfig,
) -> ScratchFile {
    let text = if !args.fields.is_empty() {
        render_or_exit(schema, &args.fields)
    } else if let Some(path) = &args.payload {
        read_payload_or_exit(Some(path))
    } else {
        fail("a record is required: pass --payload FILE or --field NAME=VALUE");
    };
    let payload = store_op_or_exit(normalize_payload(&text));
    let dir = config.scratch_dir();
    ScratchFile::create(&dir, &format!("{payload}\n")).unwrap_or_else(|e| {
        fail(format!("failed to write payload under {}: {e}", dir.display()))
    })
}

fn run(
    kind: PipelineKind,
    schema: &RecordSchema,
    file: &Path,
    placeholders: &Placeholders,
    config: &RelnoteConfig,
    json_output: bool,
) -> Result<(), String> {
    let pipeline = kind.pipeline(config);
    let mut runner = StepRunner::new(schema).serialize_writes(config.store.serialize_writes);
    if let Some(dir) = placeholders
        .output_file
        .as_deref()
        .and_then(Path::parent)
        .filter(|dir| dir.is_dir())
    {
        runner = runner.working_dir(dir);
    }

    tracing::info!(
        pipeline = kind.as_str(),
        steps = pipeline.steps.len(),
        path = %file.display(),
        "running pipeline"
    );
    let report = runner
        .run_with_rollback(&pipeline.steps, &pipeline.rollback, placeholders)
        .map_err(|e| e.to_string())?;

    if json_output {
        print_json(&json!({
            "action": kind.as_str(),
            "path": file.display().to_string(),
            "ok": report.succeeded(),
            "abortedAt": report.aborted_at,
            "steps": report.steps.iter().map(outcome_json).collect::<Vec<_>>(),
            "rollback": report.rollback.iter().map(outcome_json).collect::<Vec<_>>()
        }));
    } else {
        print_report(kind, file, &report);
    }

    match report.failure() {
        Some(failed) => Err(format!(
            "step `{}` failed with status {}; {} aborted",
            failed.name,
            failed.status,
            kind.as_str()
        )),
        None => Ok(()),
    }
}

fn outcome_json(outcome: &StepOutcome) -> Value {
    json!({
        "name": outcome.name,
        "status": outcome.status,
        "quiet": outcome.quiet,
        "output": outcome.output
    })
}

fn print_report(kind: PipelineKind, file: &Path, report: &SequenceReport) {
    println!("relnote {}\n  Path: {}", kind.as_str(), file.display());
    print_outcomes(&report.steps);
    if !report.rollback.is_empty() {
        println!("  Rollback:");
        print_outcomes(&report.rollback);
    }
}

fn print_outcomes(outcomes: &[StepOutcome]) {
    for outcome in outcomes {
        let mark = match (outcome.succeeded(), outcome.quiet) {
            (true, _) => "ok".to_string(),
            (false, true) => format!("ignored {}", outcome.status),
            (false, false) => format!("failed {}", outcome.status),
        };
        println!("  - {} [{mark}]", outcome.name);
        for line in &outcome.output {
            println!("      {line}");
        }
    }
}
