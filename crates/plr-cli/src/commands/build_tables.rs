use crate::cli::EngineArgs;
use crate::support::{engine_or_exit, exit_with, load_corpus_or_exit, percent, print_json};
use serde_json::json;

pub fn run(args: EngineArgs, out: String, json_output: bool) {
    let engine = engine_or_exit(&args);
    let corpus = load_corpus_or_exit(&args);
    let tables = engine.train(&corpus).unwrap_or_else(|e| exit_with(e));
    tables.write_to_path(&out).unwrap_or_else(|e| exit_with(e));

    let substitutions: usize = tables
        .tables
        .values()
        .map(|table| table.substitutions.len())
        .sum();

    if json_output {
        print_json(&json!({
            "out": out,
            "digest": tables.digest,
            "training": tables.training,
            "moduli": tables.tables.keys().collect::<Vec<_>>(),
            "gap_category": tables.gap_category,
            "substitutions": substitutions,
        }));
    } else {
        let training = &tables.training;
        println!("plr build-tables --corpus {}", args.corpus);
        println!();
        println!("  Output: {out}");
        println!("  Digest: {}", tables.digest);
        println!(
            "  Training slice: {}..{} ({} pairs)",
            training.start, training.end, training.pairs
        );
        println!(
            "  Messy anchors: {} ({})",
            training.messy,
            percent(training.global_rate)
        );
        if training.unresolved > 0 {
            println!("  Unresolved signatures: {}", training.unresolved);
        }
        for (modulus, table) in &tables.tables {
            println!(
                "  mod {modulus}: {} classes, {} substituted",
                table.classes.len(),
                table.substitutions.len()
            );
        }
    }
}
