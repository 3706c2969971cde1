use crate::cli::EngineArgs;
use crate::support::{
    engine_or_exit, exit_with, load_corpus_or_exit, pipeline_or_exit, print_json, yes_no,
};

pub fn run(index: usize, args: EngineArgs, tables: Option<String>, json_output: bool) {
    let engine = engine_or_exit(&args);
    let corpus = load_corpus_or_exit(&args);
    let pipeline = pipeline_or_exit(engine, &corpus, tables.as_deref());
    let prediction = pipeline
        .predict(&corpus, index)
        .unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&prediction);
        return;
    }

    println!("plr predict {index} --corpus {}", args.corpus);
    println!();
    println!("  Reference prime: {}", prediction.reference);
    println!("  Scored ranking:");
    for (rank, entry) in prediction.scored.iter().enumerate() {
        println!(
            "    {:>2}. {:>12}  gap {:>4}  rate {:.4}  {:<7}  score {:.4}{}",
            rank + 1,
            entry.value(),
            entry.gap(),
            entry.rate,
            entry.band.to_string(),
            entry.score,
            if entry.fallback { "  (fallback)" } else { "" }
        );
    }
    match prediction.applied_rule {
        Some(rule) => println!("  Correction: {rule}"),
        None => println!("  Correction: none"),
    }
    println!("  Flipped: {}", yes_no(prediction.flipped));
    println!("  Predicted: {}", prediction.predicted);
    if let Some(successor) = prediction.successor {
        println!("  True successor: {successor}");
        println!("  Correct: {}", yes_no(prediction.predicted == successor));
    }
}
