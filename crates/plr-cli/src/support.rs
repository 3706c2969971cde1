use crate::cli::EngineArgs;
use plr_corpus::PrimeSequence;
use plr_kernel::{DEFAULT_CONFIG_PATH, Engine, EngineConfiguration, Pipeline, ResidueTables};
use serde::Serialize;
use std::path::Path;

pub fn exit_with(error: impl std::fmt::Display) -> ! {
    eprintln!("error: {error}");
    std::process::exit(1);
}

/// `--config` if given, else `plr.toml` when present, else defaults.
/// A `--preset` then overrides the chain and gate selection.
pub fn load_config_or_exit(args: &EngineArgs) -> EngineConfiguration {
    let mut config = match &args.config {
        Some(path) => EngineConfiguration::load(path).unwrap_or_else(|e| exit_with(e)),
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
            EngineConfiguration::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| exit_with(e))
        }
        None => EngineConfiguration::default(),
    };
    if let Some(preset) = args.preset {
        config.apply_preset(preset.into());
    }
    config
}

pub fn engine_or_exit(args: &EngineArgs) -> Engine {
    Engine::new(load_config_or_exit(args)).unwrap_or_else(|e| exit_with(e))
}

pub fn load_corpus_or_exit(args: &EngineArgs) -> PrimeSequence {
    let corpus = PrimeSequence::read_from_path(&args.corpus).unwrap_or_else(|e| exit_with(e));
    if args.verify_primes {
        corpus.verify_primality().unwrap_or_else(|e| exit_with(e));
    }
    tracing::info!(path = %args.corpus, primes = corpus.len(), "corpus loaded");
    corpus
}

/// Saved tables when a path is given, otherwise a fresh training pass.
pub fn pipeline_or_exit(engine: Engine, corpus: &PrimeSequence, tables: Option<&str>) -> Pipeline {
    let tables = match tables {
        Some(path) => ResidueTables::read_from_path(path).unwrap_or_else(|e| exit_with(e)),
        None => engine.train(corpus).unwrap_or_else(|e| exit_with(e)),
    };
    engine.pipeline(tables).unwrap_or_else(|e| exit_with(e))
}

pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => exit_with(format!("json serialization failed: {e}")),
    }
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

pub fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}
