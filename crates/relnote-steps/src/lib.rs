//! # relnote-steps
//!
//! Ordered step sequences around a store mutation: pull, write the record,
//! commit, push. External steps are argv templates with `%name%`
//! placeholders; built-in steps call `relnote_store::FileMutator`
//! in-process.
//!
//! A failing step aborts the sequence unless it is marked quiet. An
//! optional rollback sequence runs after an abort.

pub mod runner;
pub mod template;

use relnote_store::StoreError;
use thiserror::Error;

pub use runner::{BuiltinStep, SequenceReport, StepAction, StepOutcome, StepRunner, StepSpec};
pub use template::{
    DIGEST, GROUP_NAME, ORIG_FILE, OUTPUT_FILE, PLACEHOLDER_NAMES, Placeholders, TMP_FILENAME,
};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown placeholder %{0}%")]
    UnknownPlaceholder(String),

    #[error("placeholder %{0}% has no value for this sequence")]
    MissingValue(String),

    #[error("step has an empty command line")]
    EmptyCommand,

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
