use crate::support::{exit_with, print_json, yes_no};
use plr_kernel::{DEFAULT_CONFIG_PATH, EngineConfiguration, Preset};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    pub preset: Preset,
    pub created_dir: bool,
    pub overwrote: bool,
}

pub fn write_config(
    path: impl AsRef<Path>,
    preset: Preset,
    force: bool,
) -> Result<InitOutcome, String> {
    let dir = path.as_ref().to_path_buf();

    let mut created_dir = false;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .map_err(|e| format!("failed to create init path {}: {e}", dir.display()))?;
        created_dir = true;
    }
    if !dir.is_dir() {
        return Err(format!("init path is not a directory: {}", dir.display()));
    }

    let config_path = dir.join(DEFAULT_CONFIG_PATH);
    let overwrote = config_path.exists();
    if overwrote && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }

    let text = EngineConfiguration::preset(preset)
        .to_toml_string()
        .map_err(|e| e.to_string())?;
    fs::write(&config_path, text)
        .map_err(|e| format!("failed to write {}: {e}", config_path.display()))?;

    Ok(InitOutcome {
        config_path,
        preset,
        created_dir,
        overwrote,
    })
}

pub fn run(path: String, preset: Option<Preset>, force: bool, json_output: bool) {
    let preset = preset.unwrap_or(Preset::Full);
    let outcome = write_config(&path, preset, force).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "config_path": outcome.config_path.display().to_string(),
            "preset": outcome.preset.to_string(),
            "created_dir": outcome.created_dir,
            "overwrote": outcome.overwrote,
        }));
    } else {
        println!("plr init {path}");
        println!();
        println!("  config: {}", outcome.config_path.display());
        println!("  preset: {}", outcome.preset);
        println!("  created directory: {}", yes_no(outcome.created_dir));
        println!("  overwrote existing: {}", yes_no(outcome.overwrote));
    }
}
