//! Results command implementation.

use fleetsync_store::DataDir;
use std::error::Error;
use std::path::Path;

/// Runs the results command.
pub fn run(data_dir: &Path, limit: usize, format: &str) -> Result<(), Box<dyn Error>> {
    let dir = DataDir::open(data_dir)?;
    let summaries = dir.results().list(limit)?;
    let pending = dir.latest_unreverted_run()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No runs recorded in {}", data_dir.display());
        return Ok(());
    }

    println!(
        "{:<20} {:<36} {:>7} {:>7} {:>7} {:>6}  flags",
        "started", "run", "created", "updated", "skipped", "errors"
    );
    for summary in &summaries {
        let mut flags = Vec::new();
        if summary.dry_run {
            flags.push("dry-run");
        }
        if summary.cancelled {
            flags.push("cancelled");
        }
        if pending.as_deref() == Some(summary.run_id.as_str()) {
            flags.push("revertible");
        }
        println!(
            "{:<20} {:<36} {:>7} {:>7} {:>7} {:>6}  {}",
            summary.timestamp.format("%Y-%m-%d %H:%M:%S"),
            summary.run_id,
            summary.created,
            summary.updated,
            summary.skipped,
            summary.errors,
            flags.join(",")
        );
    }

    Ok(())
}
