use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use hesitancy::{AnalysisConfig, run_all};
use log::{info, warn};

/// Resolve a directory from a positional argument, then an env var, then a default
fn resolve_dir(arg: Option<String>, var: &str, default: &str) -> PathBuf {
    arg.or_else(|| env::var(var).ok())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let data_dir = resolve_dir(args.next(), "HESITANCY_DATA_DIR", "data");
    let output_dir = resolve_dir(args.next(), "HESITANCY_OUTPUT_DIR", "outputs");

    let config = match env::var("HESITANCY_CONFIG") {
        Ok(path) => AnalysisConfig::from_json_file(Path::new(&path))
            .with_context(|| format!("failed to load configuration from {path}"))?,
        Err(_) => AnalysisConfig::default(),
    };
    info!("{config}");

    if !data_dir.is_dir() {
        warn!("Data directory not found: {}", data_dir.display());
    }
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    info!(
        "Analyzing {} into {}",
        data_dir.display(),
        output_dir.display()
    );
    let start = Instant::now();
    let summary = run_all(
        &data_dir,
        &output_dir,
        &config,
        chrono::Local::now().naive_local(),
    );
    info!("Finished in {:?}", start.elapsed());

    let skipped = summary.skipped_stages();
    if !skipped.is_empty() {
        warn!("{} stage(s) skipped; see the remedies above", skipped.len());
    }
    Ok(())
}
