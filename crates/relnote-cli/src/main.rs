//! Relnote CLI: the `relnote` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

/// Log filter variable; defaults to `warn` so stdout stays clean.
const LOG_ENV: &str = "RELNOTE_LOG";

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    setup_tracing();
    let cli = Cli::parse();
    let config = support::load_config_or_exit(cli.config.as_deref());
    let json = cli.json;

    match cli.command {
        Commands::Parse { file, schema } => commands::parse::run(file, schema, &config, json),

        Commands::Diff { old, new, schema } => {
            commands::diff::run(old, new, schema, &config, json)
        }

        Commands::Digest { file } => commands::digest::run(file, json),

        Commands::Insert {
            file,
            group,
            payload,
            schema,
        } => commands::mutate::run_insert(file, group, payload, schema, &config, json),

        Commands::Update {
            file,
            digest,
            payload,
            schema,
        } => commands::mutate::run_update(file, digest, payload, schema, &config, json),

        Commands::Remove {
            file,
            digest,
            schema,
        } => commands::mutate::run_remove(file, digest, schema, &config, json),

        Commands::Render { fields, schema } => {
            commands::render::run(fields, schema, &config, json)
        }

        Commands::Publish {
            file,
            group,
            payload,
        } => commands::pipeline::run_publish(file, group, payload, &config, json),

        Commands::Amend {
            file,
            digest,
            payload,
        } => commands::pipeline::run_amend(file, digest, payload, &config, json),

        Commands::Retract {
            file,
            digest,
            schema,
        } => commands::pipeline::run_retract(file, digest, schema, &config, json),

        Commands::Schemas => commands::schemas::run(&config, json),
    }
}
