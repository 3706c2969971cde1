//! PLR CLI: the `plr` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    // Logs go to stderr so `--json` stdout stays parseable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            path,
            preset,
            force,
            json,
        } => commands::init::run(path, preset.map(Into::into), force, json),

        Commands::BuildTables { engine, out, json } => {
            commands::build_tables::run(engine, out, json)
        }

        Commands::Evaluate {
            engine,
            tables,
            sequential,
            json,
        } => commands::evaluate::run(engine, tables, sequential, json),

        Commands::Predict {
            index,
            engine,
            tables,
            json,
        } => commands::predict::run(index, engine, tables, json),
    }
}
