//! Split command implementation

use anyhow::Result;
use std::path::Path;

use crate::dataset::split;
use crate::model;

pub fn run(input: &Path, out_dir: &Path) -> Result<()> {
    let records = model::load_conversations(input)?;
    let total = records.len();
    let grouped = split::split_by_date(records);

    let written = split::write_split(out_dir, &grouped)?;
    for (path, count) in &written {
        println!("   {} ({} conversations)", path.display(), count);
    }

    println!(
        "\n✅ Split {} conversations into {} files",
        total - grouped.undated.len(),
        written.len()
    );
    if !grouped.undated.is_empty() {
        println!("⚠️  {} conversations had no date and were left out", grouped.undated.len());
    }
    Ok(())
}
