use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relnote",
    about = "Relnote: flat-file release note store with format-preserving edits",
    version
)]
pub struct Cli {
    /// Path to relnote.toml (default: ./relnote.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a store file and list its groups and records
    Parse {
        /// Store file
        file: PathBuf,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// List records present in NEW but not in OLD, per group
    Diff {
        /// Older snapshot of the store file
        old: PathBuf,

        /// Newer snapshot of the store file
        new: PathBuf,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Print the digest a payload would have as a record
    Digest {
        /// Payload file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Insert a record at the end of a group, creating the group if needed
    Insert {
        /// Store file
        file: PathBuf,

        /// Target group name
        #[arg(long)]
        group: String,

        /// File holding the record text (`-` for stdin)
        #[arg(long)]
        payload: PathBuf,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Replace the record with the given digest
    Update {
        /// Store file
        file: PathBuf,

        /// Digest of the record to replace
        #[arg(long)]
        digest: String,

        /// File holding the replacement text (`-` for stdin)
        #[arg(long)]
        payload: PathBuf,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Remove the record with the given digest
    Remove {
        /// Store file
        file: PathBuf,

        /// Digest of the record to remove
        #[arg(long)]
        digest: String,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Render field values as record text
    Render {
        /// Field assignment `name=value` (repeatable; repeats append lines).
        /// Checklists take `[x] Item: text` entries separated by `;`
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Run the configured insert pipeline
    Publish {
        /// Store file
        file: PathBuf,

        /// Target group name
        #[arg(long)]
        group: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Run the configured update pipeline
    Amend {
        /// Store file
        file: PathBuf,

        /// Digest of the record to replace
        #[arg(long)]
        digest: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Run the configured remove pipeline
    Retract {
        /// Store file
        file: PathBuf,

        /// Digest of the record to remove
        #[arg(long)]
        digest: String,

        /// Record schema (default: store.schema from config)
        #[arg(long)]
        schema: Option<String>,
    },

    /// List known record schemas and their fields
    Schemas,
}

/// Record text for a pipeline: a payload file or rendered field values.
#[derive(Args, Debug, Clone)]
pub struct PayloadArgs {
    /// File holding the record text (`-` for stdin)
    #[arg(long, conflicts_with = "fields")]
    pub payload: Option<PathBuf>,

    /// Field assignment `name=value`, rendered with the schema (repeatable)
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Record schema (default: store.schema from config)
    #[arg(long)]
    pub schema: Option<String>,
}
