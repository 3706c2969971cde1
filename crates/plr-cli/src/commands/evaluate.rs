use crate::cli::EngineArgs;
use crate::support::{
    engine_or_exit, exit_with, load_corpus_or_exit, percent, pipeline_or_exit, print_json,
};
use plr_kernel::Evaluator;

pub fn run(args: EngineArgs, tables: Option<String>, sequential: bool, json_output: bool) {
    let engine = engine_or_exit(&args);
    let corpus = load_corpus_or_exit(&args);
    let pipeline = pipeline_or_exit(engine, &corpus, tables.as_deref());

    let evaluator = Evaluator::new(&pipeline, &corpus);
    let result = if sequential {
        evaluator.run_sequential()
    } else {
        evaluator.run()
    };
    let result = result.unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&result);
        return;
    }

    let matrix = &result.confusion_matrix;
    println!("plr evaluate --corpus {}", args.corpus);
    println!();
    println!("  Tables: {}", result.table_digest);
    println!("  Range: {}..{}", result.start, result.end);
    println!(
        "  Accuracy: {} ({}/{})",
        percent(result.accuracy),
        result.correct,
        result.total
    );
    println!(
        "  Scorer only: {} ({}/{})",
        percent(result.baseline_accuracy),
        result.baseline_correct,
        result.total
    );
    println!(
        "  Random chance: {} ({} candidates)",
        percent(result.random_accuracy),
        result.candidates
    );
    println!("  Confusion (true anchor class):");
    println!(
        "    correct:   clean {:>10}  messy {:>10}",
        matrix.correct_clean, matrix.correct_messy
    );
    println!(
        "    incorrect: clean {:>10}  messy {:>10}",
        matrix.incorrect_clean, matrix.incorrect_messy
    );
    for (rule, count) in &result.overrides {
        println!("  Override {rule}: {count}");
    }
    println!("  Flips: {}", result.flips);
    if result.uncovered > 0 {
        println!("  Uncovered (successor outside pool): {}", result.uncovered);
    }
    if result.single_candidate_pools > 0 {
        println!("  Single-candidate pools: {}", result.single_candidate_pools);
    }
    if result.fallback_lookups > 0 {
        println!("  Fallback lookups: {}", result.fallback_lookups);
    }
}
