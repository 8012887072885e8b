//! Separate command implementation: pull out non-retrieval conversations

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dataset::non_retrieval;
use crate::model;

pub fn run(config: &Config, pattern: &str, out_dir: &Path) -> Result<()> {
    let files: Vec<PathBuf> = model::discover(&config.data_root(), pattern)?;
    if files.is_empty() {
        println!("No files match '{}' under {}.", pattern, config.data_root().display());
        return Ok(());
    }

    let excluded = &config.filter.excluded_farmers;
    let mut total = 0;
    let mut separated = 0;

    for path in &files {
        match non_retrieval::separate_file(path, out_dir, excluded) {
            Ok((count, Some((output, selected)))) => {
                total += count;
                separated += selected;
                println!("   {} → {} ({} conversations)", path.display(), output.display(), selected);
            }
            Ok((count, None)) => {
                total += count;
                println!("   {}: no non-retrieval conversations", path.display());
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                println!("   ⚠️  {}: {:#}", path.display(), e);
            }
        }
    }

    println!("\nSeparated {} of {} conversations", separated, total);
    Ok(())
}
