//! Revert command implementation.

use super::{confirm, Remote};
use fleetsync_engine::{DryRunSwitch, EngineConfig, RevertReport};
use fleetsync_store::DataDir;
use std::error::Error;
use std::path::Path;

/// Runs the revert command.
///
/// Without `run_id`, the latest run still present in the revert log is
/// reverted.
pub fn run(
    data_dir: &Path,
    remote: &Remote,
    run_id: Option<String>,
    dry_run: bool,
    yes: bool,
) -> Result<(), Box<dyn Error>> {
    let dir = DataDir::open(data_dir)?;
    let mut log = dir.load_revert_log()?;

    let Some(run_id) = run_id.or_else(|| log.latest_run().map(str::to_string)) else {
        println!("Nothing to revert: the revert log is empty");
        return Ok(());
    };
    let entries = log.entries_for(&run_id);
    if entries.is_empty() {
        println!("No revert entries for run {run_id}");
        return Ok(());
    }

    println!("Run {run_id} created {} records:", entries.len());
    for entry in &entries {
        println!("  {} #{} ({})", entry.endpoint, entry.destination_id, entry.name);
    }
    println!();

    if dry_run {
        println!("(dry run - no changes will be made)");
    } else if !yes {
        let question = format!("Delete {} records?", entries.len());
        if !confirm(&question)? {
            println!("Aborted");
            return Ok(());
        }
    }

    let executor = remote.executor(DryRunSwitch::new(dry_run), EngineConfig::new())?;
    let outcome = executor.revert(&run_id, &mut log, dry_run);
    if !dry_run {
        dir.save_revert_log(&log)?;
    }
    print_report(&outcome?);

    Ok(())
}

fn print_report(report: &RevertReport) {
    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    println!("{verb}:        {}", report.deleted.len());
    println!("Already gone:   {}", report.already_absent.len());
    println!("Failed:         {}", report.failed.len());
    for failure in &report.failed {
        println!(
            "  ✗ {} #{}: {}",
            failure.endpoint, failure.destination_id, failure.message
        );
    }
    if !report.is_complete() {
        println!();
        println!("Failed entries stay in the revert log; run revert again to retry.");
    }
}
