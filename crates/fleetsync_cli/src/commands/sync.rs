//! Sync command implementation.

use super::{confirm, load_source, print_summary, Remote};
use fleetsync_engine::{
    build_plan, CancelToken, DryRunSwitch, EngineConfig, PlanSummary, RunOptions, Selection,
};
use fleetsync_model::{OutcomeStatus, SyncResult};
use fleetsync_store::{load_snapshot, DataDir};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments of the sync command.
pub struct SyncArgs {
    /// Registry export.
    pub source: PathBuf,
    /// Snapshot file replacing the destination listing.
    pub snapshot: Option<PathBuf>,
    /// Intercept every write.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub yes: bool,
    /// Never update.
    pub create_only: bool,
    /// Source ids to process; empty means all.
    pub select: Vec<String>,
}

/// Runs the sync command.
pub fn run(data_dir: &Path, remote: &Remote, args: &SyncArgs) -> Result<(), Box<dyn Error>> {
    let dir = DataDir::open(data_dir)?;
    let config = EngineConfig::new();
    let records = load_source(&args.source, &config)?;

    let executor = remote.executor(DryRunSwitch::new(args.dry_run), config)?;

    let items = match &args.snapshot {
        Some(path) => build_plan(&records, &load_snapshot(path)?),
        None => executor.plan(&records)?,
    };
    let options = RunOptions::new()
        .with_dry_run(args.dry_run)
        .with_auto_confirm(args.yes)
        .with_create_only(args.create_only)
        .with_selection(Selection::from_ids(args.select.iter().cloned()));

    // Counts what this run will do, after selection and create-only.
    let summary = PlanSummary::for_run(&items, &options);
    print_summary(&summary);
    println!();

    if summary.is_noop() {
        // Still executed and recorded, so the run shows up in `results`.
        println!("Nothing to write: every item is skipped");
    } else if args.dry_run {
        println!("(dry run - no changes will be made)");
    } else if !args.yes {
        let question = format!(
            "Create {} and update {} records in {}?",
            summary.creates(),
            summary.updates(),
            remote.base_url().unwrap_or_default()
        );
        if !confirm(&question)? {
            println!("Aborted");
            return Ok(());
        }
    }

    let mut log = dir.load_revert_log()?;
    let outcome = executor.execute(&items, &options, &CancelToken::new(), &mut log);
    // Entries appended before an abort still name real records.
    if !args.dry_run {
        dir.save_revert_log(&log)?;
    }
    let result = outcome?;

    let path = dir.results().save(&result)?;
    print_result(&result);
    let stats = executor.limiter_stats();
    println!(
        "  Limiter: {} calls, {} throttled, interval {:?}",
        stats.total_calls, stats.throttled, stats.current_interval
    );
    println!();
    println!("Results written to {}", path.display());
    if !result.dry_run && result.created > 0 {
        println!("Revert with: fleetsync revert --run-id {}", result.run_id);
    }
    info!(run_id = %result.run_id, "sync finished");

    Ok(())
}

fn print_result(result: &SyncResult) {
    println!("Run {}{}:", result.run_id, if result.dry_run { " (dry run)" } else { "" });
    println!("  Created: {}", result.created);
    println!("  Updated: {}", result.updated);
    println!("  Skipped: {}", result.skipped);
    println!("  Errors:  {}", result.errors);
    if result.cancelled {
        println!("  Cancelled after {} items", result.total_items);
    }
    for item in result.items.iter().filter(|o| o.status == OutcomeStatus::Failed) {
        println!(
            "  ✗ {} ({}): {}",
            item.name,
            item.source_id,
            item.message.as_deref().unwrap_or("failed")
        );
    }
}
