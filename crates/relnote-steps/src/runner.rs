//! Ordered step sequences: external commands plus built-in store mutations.

use crate::StepError;
use crate::template::{
    DIGEST, GROUP_NAME, OUTPUT_FILE, Placeholders, TMP_FILENAME, path_exists,
};
use relnote_store::{FileMutator, RecordSchema, with_file_lock};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Store operations a sequence can run in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// Create `%outputFile%` if it does not exist.
    Touch,
    /// Insert the `%tmpFilename%` payload into `%groupName%` of `%outputFile%`.
    Insert,
    /// Replace record `%digest%` with the `%tmpFilename%` payload.
    Update,
    /// Delete record `%digest%`.
    Remove,
}

impl BuiltinStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Touch => "touch",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// External program; argv elements may contain placeholders.
    Run(Vec<String>),
    Builtin(BuiltinStep),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStepSpec {
    name: Option<String>,
    #[serde(default)]
    run: Option<Vec<String>>,
    #[serde(default)]
    builtin: Option<BuiltinStep>,
    #[serde(default)]
    quiet: bool,
}

/// One named step. Quiet steps may fail without aborting the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawStepSpec")]
pub struct StepSpec {
    pub name: String,
    pub action: StepAction,
    pub quiet: bool,
}

impl TryFrom<RawStepSpec> for StepSpec {
    type Error = String;

    fn try_from(raw: RawStepSpec) -> Result<Self, Self::Error> {
        let action = match (raw.run, raw.builtin) {
            (Some(argv), None) => StepAction::Run(argv),
            (None, Some(builtin)) => StepAction::Builtin(builtin),
            (Some(_), Some(_)) => {
                return Err("step must set exactly one of `run` or `builtin`, not both".to_string());
            }
            (None, None) => return Err("step must set `run` or `builtin`".to_string()),
        };
        let name = raw.name.unwrap_or_else(|| match &action {
            StepAction::Run(argv) => argv.first().cloned().unwrap_or_default(),
            StepAction::Builtin(builtin) => builtin.as_str().to_string(),
        });
        Ok(Self {
            name,
            action,
            quiet: raw.quiet,
        })
    }
}

impl StepSpec {
    pub fn run<I, S>(name: &str, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            action: StepAction::Run(argv.into_iter().map(Into::into).collect()),
            quiet: false,
        }
    }

    pub fn builtin(builtin: BuiltinStep) -> Self {
        Self {
            name: builtin.as_str().to_string(),
            action: StepAction::Builtin(builtin),
            quiet: false,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

/// Result of one executed step.
#[derive(Debug)]
pub struct StepOutcome {
    pub name: String,
    /// Exit status; 0 is success, -1 when the process died from a signal.
    pub status: i32,
    /// Captured stdout then stderr lines, or the built-in's report.
    pub output: Vec<String>,
    pub quiet: bool,
    /// Structured cause for failures raised before or inside a built-in.
    pub error: Option<StepError>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }

    fn failed(name: &str, quiet: bool, error: StepError) -> Self {
        Self {
            name: name.to_string(),
            status: 1,
            output: vec![error.to_string()],
            quiet,
            error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct SequenceReport {
    pub steps: Vec<StepOutcome>,
    /// Index of the non-quiet step that stopped the sequence.
    pub aborted_at: Option<usize>,
    /// Compensating steps run after an abort.
    pub rollback: Vec<StepOutcome>,
}

impl SequenceReport {
    pub fn succeeded(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// The step that aborted the sequence.
    pub fn failure(&self) -> Option<&StepOutcome> {
        self.aborted_at.and_then(|idx| self.steps.get(idx))
    }
}

/// Runs step sequences against one record schema.
#[derive(Debug, Clone)]
pub struct StepRunner<'s> {
    schema: &'s RecordSchema,
    working_dir: Option<PathBuf>,
    serialize_writes: bool,
}

impl<'s> StepRunner<'s> {
    pub fn new(schema: &'s RecordSchema) -> Self {
        Self {
            schema,
            working_dir: None,
            serialize_writes: false,
        }
    }

    /// Directory external commands run in.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Hold `<outputFile>.lock` for the whole sequence.
    pub fn serialize_writes(mut self, enabled: bool) -> Self {
        self.serialize_writes = enabled;
        self
    }

    /// Run `steps` in order, stopping at the first failing non-quiet step.
    ///
    /// Fails only when the per-file lock is enabled and busy.
    pub fn run_sequence(
        &self,
        steps: &[StepSpec],
        placeholders: &Placeholders,
    ) -> Result<SequenceReport, StepError> {
        self.run_with_rollback(steps, &[], placeholders)
    }

    /// Like [`run_sequence`](Self::run_sequence), then run `rollback`
    /// (best-effort, every step quiet) if the sequence aborted.
    pub fn run_with_rollback(
        &self,
        steps: &[StepSpec],
        rollback: &[StepSpec],
        placeholders: &Placeholders,
    ) -> Result<SequenceReport, StepError> {
        let run = || -> Result<SequenceReport, StepError> {
            let mut report = self.run_steps(steps, placeholders);
            if let Some(failed) = report.failure() {
                tracing::warn!(step = %failed.name, status = failed.status, "step sequence aborted");
                if !rollback.is_empty() {
                    let compensating: Vec<StepSpec> =
                        rollback.iter().cloned().map(StepSpec::quiet).collect();
                    report.rollback = self.run_steps(&compensating, placeholders).steps;
                }
            }
            Ok(report)
        };

        match (&placeholders.output_file, self.serialize_writes) {
            (Some(output), true) => with_file_lock(output, run),
            _ => run(),
        }
    }

    fn run_steps(&self, steps: &[StepSpec], placeholders: &Placeholders) -> SequenceReport {
        let mut report = SequenceReport::default();
        for (idx, step) in steps.iter().enumerate() {
            tracing::debug!(step = %step.name, quiet = step.quiet, "running step");
            let outcome = self.run_step(step, placeholders);
            let failed = !outcome.succeeded();
            report.steps.push(outcome);
            if failed {
                if step.quiet {
                    tracing::warn!(step = %step.name, "quiet step failed; continuing");
                } else {
                    report.aborted_at = Some(idx);
                    break;
                }
            }
        }
        report
    }

    fn run_step(&self, step: &StepSpec, placeholders: &Placeholders) -> StepOutcome {
        let result = match &step.action {
            StepAction::Run(argv) => placeholders
                .substitute_all(argv)
                .and_then(|argv| run_command(&argv, self.working_dir.as_deref())),
            StepAction::Builtin(builtin) => self
                .run_builtin(*builtin, placeholders)
                .map(|output| (0, output)),
        };
        match result {
            Ok((status, output)) => StepOutcome {
                name: step.name.clone(),
                status,
                output,
                quiet: step.quiet,
                error: None,
            },
            Err(error) => StepOutcome::failed(&step.name, step.quiet, error),
        }
    }

    fn run_builtin(
        &self,
        builtin: BuiltinStep,
        placeholders: &Placeholders,
    ) -> Result<Vec<String>, StepError> {
        let output_file = placeholders.require_path(OUTPUT_FILE)?;
        let mutator = FileMutator::new(self.schema);
        match builtin {
            BuiltinStep::Touch => touch(&output_file),
            BuiltinStep::Insert => {
                let group = placeholders.require(GROUP_NAME)?;
                let payload = read_payload(&placeholders.require_path(TMP_FILENAME)?)?;
                let outcome = mutator.insert(&output_file, &group, &payload)?;
                let mut output = Vec::new();
                if outcome.group_created {
                    output.push(format!("group [{group}] created"));
                }
                output.push(format!(
                    "inserted {} into [{group}] at line {}",
                    outcome.digest,
                    outcome.first_line + 1
                ));
                Ok(output)
            }
            BuiltinStep::Update => {
                let digest = placeholders.require(DIGEST)?;
                let payload = read_payload(&placeholders.require_path(TMP_FILENAME)?)?;
                let outcome = mutator.update(&output_file, &digest, &payload)?;
                Ok(vec![format!(
                    "updated {} -> {}",
                    outcome.previous.digest(),
                    outcome.digest.map(|d| d.to_string()).unwrap_or_default()
                )])
            }
            BuiltinStep::Remove => {
                let digest = placeholders.require(DIGEST)?;
                let outcome = mutator.remove(&output_file, &digest)?;
                Ok(vec![format!("removed {}", outcome.previous.digest())])
            }
        }
    }
}

fn touch(path: &Path) -> Result<Vec<String>, StepError> {
    if path_exists(path) {
        return Ok(Vec::new());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| StepError::Io {
            context: format!("create {}", parent.display()),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StepError::Io {
            context: format!("touch {}", path.display()),
            source,
        })?;
    Ok(vec![format!("created {}", path.display())])
}

fn read_payload(path: &Path) -> Result<String, StepError> {
    fs::read_to_string(path).map_err(|source| StepError::Io {
        context: format!("read payload {}", path.display()),
        source,
    })
}

fn run_command(argv: &[String], cwd: Option<&Path>) -> Result<(i32, Vec<String>), StepError> {
    let (program, args) = argv.split_first().ok_or(StepError::EmptyCommand)?;
    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    let output = command.output().map_err(|source| StepError::Spawn {
        program: program.clone(),
        source,
    })?;

    let status = output.status.code().unwrap_or(-1);
    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(ToOwned::to_owned)
        .collect();
    lines.extend(
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(ToOwned::to_owned),
    );
    tracing::debug!(program = %program, status, "external step finished");
    Ok((status, lines))
}
