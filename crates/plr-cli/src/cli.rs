use clap::{Args, Parser, Subcommand, ValueEnum};
use plr_kernel::Preset;

#[derive(Parser)]
#[command(
    name = "plr",
    about = "PLR: rank next-prime candidates by residue statistics and measure the ranking",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory to write plr.toml into
        #[arg(default_value = ".")]
        path: String,

        /// Engine selection to write
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,

        /// Overwrite an existing plr.toml
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train residue tables on the configured slice and save them
    BuildTables {
        #[command(flatten)]
        engine: EngineArgs,

        /// Where to write the tables
        #[arg(long, default_value = "plr-tables.json")]
        out: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the pipeline over the evaluation slice and report accuracy
    Evaluate {
        #[command(flatten)]
        engine: EngineArgs,

        /// Saved tables to score against (trained from the corpus otherwise)
        #[arg(long)]
        tables: Option<String>,

        /// Evaluate on one thread
        #[arg(long)]
        sequential: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Trace the pipeline for one prime of the corpus
    Predict {
        /// 0-based corpus index of the reference prime
        index: usize,

        #[command(flatten)]
        engine: EngineArgs,

        /// Saved tables to score against (trained from the corpus otherwise)
        #[arg(long)]
        tables: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Inputs shared by every command that runs the engine.
#[derive(Args, Clone, Debug)]
pub struct EngineArgs {
    /// Prime corpus: one integer per line
    #[arg(long)]
    pub corpus: String,

    /// Configuration file (plr.toml in the working directory if present)
    #[arg(long)]
    pub config: Option<String>,

    /// Replace the configured chain and gate with a preset
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Check every corpus entry for primality before use
    #[arg(long)]
    pub verify_primes: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PresetArg {
    #[value(name = "baseline")]
    Baseline,
    #[value(name = "chained")]
    Chained,
    #[value(name = "flip")]
    Flip,
    #[value(name = "full")]
    Full,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Baseline => Preset::Baseline,
            PresetArg::Chained => Preset::Chained,
            PresetArg::Flip => Preset::Flip,
            PresetArg::Full => Preset::Full,
        }
    }
}
